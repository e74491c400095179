use thiserror::Error;

/// Failures that stop the Discord adapter from starting or connecting.
///
/// Per-message failures never surface here; the queue logs and skips them.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// Client construction or gateway failure reported by serenity.
    #[error("Discord client error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("Discord bot token is empty; set discord.bot_token or RELAY_DISCORD__BOT_TOKEN")]
    NoToken,
}
