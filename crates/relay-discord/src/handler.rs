use std::sync::{Arc, OnceLock};

use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, UserId};
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::{error, info, warn};

use relay_agent::pipeline::MessageQueue;
use relay_agent::Session;
use relay_core::config::DiscordConfig;

use crate::send;
use crate::target::DiscordTarget;

/// Serenity event handler: filters inbound events and feeds the queue.
pub struct RelayHandler {
    pub queue: MessageQueue<DiscordTarget>,
    pub config: DiscordConfig,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();

        info!(name = %ready.user.name, id = %ready.user.id, "Discord bot connected");

        ctx.set_presence(
            Some(ActivityData::listening(&self.config.activity_name)),
            OnlineStatus::Online,
        );

        crate::commands::register_commands(&ctx, self.queue.session()).await;

        let session = Arc::clone(self.queue.session());
        if session.claim_startup() {
            let http = Arc::clone(&ctx.http);
            let channel = self.config.startup_channel_id;
            tokio::spawn(async move {
                send_startup_prompt(http, session, channel).await;
            });
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(bot_id) = self.bot_id.get().copied() else {
            return;
        };
        let session = self.queue.session();

        let gate = Gate {
            bot_id: bot_id.get(),
            reply_all: session.reply_all(),
            reply_all_channel_id: self.config.reply_all_channel_id,
        };
        if !gate.admits(msg.author.id.get(), msg.channel_id.get(), msg.mentions_user_id(bot_id)) {
            return;
        }

        // A bare mention is still queued; the model sees an empty turn.
        let content = strip_mentions(&msg.content, bot_id.get());
        let target = DiscordTarget::from_message(Arc::clone(&ctx.http), &msg);
        if let Err(e) = self.queue.enqueue(target, content).await {
            error!(channel = %msg.channel_id, error = %e, "failed to enqueue message");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            crate::commands::handle_interaction(&self.queue, &ctx, &command).await;
        }
    }
}

/// Which inbound messages get queued.
#[derive(Debug, Clone, Copy)]
struct Gate {
    bot_id: u64,
    reply_all: bool,
    reply_all_channel_id: Option<u64>,
}

impl Gate {
    /// Never our own messages. A mention always qualifies. In reply-all mode
    /// everything else does too, optionally only in one channel.
    fn admits(&self, author_id: u64, channel_id: u64, mentions_bot: bool) -> bool {
        if author_id == self.bot_id {
            return false;
        }
        if mentions_bot {
            return true;
        }
        self.reply_all
            && self
                .reply_all_channel_id
                .map_or(true, |only| only == channel_id)
    }
}

/// Remove `<@id>` / `<@!id>` mentions of the bot and trim.
fn strip_mentions(s: &str, bot_id: u64) -> String {
    s.replace(&format!("<@{bot_id}>"), "")
        .replace(&format!("<@!{bot_id}>"), "")
        .trim()
        .to_string()
}

/// Resolve the startup prompt and post the reply straight to the startup
/// channel, bypassing the queue. Every failure is logged and skipped.
async fn send_startup_prompt(http: Arc<Http>, session: Arc<Session>, channel: Option<u64>) {
    let Some(raw_id) = channel else {
        warn!("No Discord channel ID provided for startup prompt.");
        return;
    };
    if raw_id == 0 {
        warn!(channel = raw_id, "Invalid Discord channel ID");
        return;
    }

    let channel_id = ChannelId::new(raw_id);
    if let Err(e) = channel_id.to_channel(&http).await {
        warn!(channel = raw_id, error = %e, "Invalid Discord channel ID");
        return;
    }

    let Some(prompt) = session.startup_prompt() else {
        info!("No starting prompt provided.");
        return;
    };

    info!(
        chars = prompt.chars().count(),
        channel = raw_id,
        "sending startup prompt"
    );

    let reply = match session.resolve(prompt, &[]).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "Error while sending startup prompt");
            return;
        }
    };

    if let Err(e) = send::send_chunked(&http, channel_id, &reply).await {
        error!(channel = raw_id, error = %e, "Error while sending startup prompt reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: u64 = 42;
    const USER: u64 = 7;

    fn gate(reply_all: bool, reply_all_channel_id: Option<u64>) -> Gate {
        Gate {
            bot_id: BOT,
            reply_all,
            reply_all_channel_id,
        }
    }

    #[test]
    fn mention_mode_requires_mention() {
        let gate = gate(false, None);
        assert!(gate.admits(USER, 1, true));
        assert!(!gate.admits(USER, 1, false));
        assert!(!gate.admits(BOT, 1, true));
    }

    #[test]
    fn reply_all_admits_everything_but_self() {
        let gate = gate(true, None);
        assert!(gate.admits(USER, 1, false));
        assert!(gate.admits(USER, 2, true));
        assert!(!gate.admits(BOT, 1, false));
    }

    #[test]
    fn reply_all_channel_restriction() {
        let gate = gate(true, Some(10));
        assert!(gate.admits(USER, 10, false));
        assert!(!gate.admits(USER, 11, false));
    }

    #[test]
    fn mention_outside_reply_all_channel_is_admitted() {
        let gate = gate(true, Some(10));
        assert!(gate.admits(USER, 11, true));
        assert!(!gate.admits(BOT, 11, true));
    }

    #[test]
    fn other_bots_are_answered_in_reply_all_mode() {
        let other_bot = 77;
        assert!(gate(true, None).admits(other_bot, 1, false));
        assert!(gate(false, None).admits(other_bot, 1, true));
    }

    #[test]
    fn bare_mention_is_admitted_with_empty_text() {
        assert!(gate(false, None).admits(USER, 1, true));
        assert_eq!(strip_mentions("<@42>", BOT), "");
    }

    #[test]
    fn strips_bot_mentions_only() {
        assert_eq!(strip_mentions("<@42> hello", 42), "hello");
        assert_eq!(strip_mentions("hey <@!42> there", 42), "hey  there");
        assert_eq!(strip_mentions("<@7> hi", 42), "<@7> hi");
        assert_eq!(strip_mentions("  <@42>  ", 42), "");
    }
}
