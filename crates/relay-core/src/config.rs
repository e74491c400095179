use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Env var prefix for overrides. Nested keys use a double underscore:
/// `RELAY_DISCORD__BOT_TOKEN`, `RELAY_MODEL__VISION`.
pub const ENV_PREFIX: &str = "RELAY_";
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";
pub const DEFAULT_ACTIVITY: &str = "/chat | /help";

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub discord: DiscordConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Named priming prompts selectable with `/switchpersona`.
    /// `standard` is always available and carries no prompt.
    #[serde(default)]
    pub personas: BTreeMap<String, String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Channel that receives the startup prompt reply once the bot connects.
    pub startup_channel_id: Option<u64>,
    /// When true every inbound message is answered, not only mentions.
    #[serde(default)]
    pub reply_all: bool,
    /// Restricts reply-all mode to a single channel.
    pub reply_all_channel_id: Option<u64>,
    /// When true `/chat` responses are deferred as ephemeral.
    #[serde(default)]
    pub private_replies: bool,
    #[serde(default = "default_activity")]
    pub activity_name: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("startup_channel_id", &self.startup_channel_id)
            .field("reply_all", &self.reply_all)
            .field("reply_all_channel_id", &self.reply_all_channel_id)
            .field("private_replies", &self.private_replies)
            .field("activity_name", &self.activity_name)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Model identifiers: `text` for plain turns, `vision` when images are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_text_model")]
    pub text: String,
    #[serde(default = "default_vision_model")]
    pub vision: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            vision: default_vision_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    /// Plain-text file sent through the model once at startup.
    pub startup_path: Option<String>,
}

impl PromptConfig {
    /// Read the startup prompt file.
    ///
    /// Returns `None` when no path is configured, the file is unreadable, or
    /// it contains only whitespace. Read failures are logged, never fatal.
    pub fn load_startup(&self) -> Option<String> {
        let path = self.startup_path.as_deref()?;
        match std::fs::read_to_string(Path::new(path)) {
            Ok(text) if text.trim().is_empty() => {
                info!(path, "startup prompt file is empty");
                None
            }
            Ok(text) => {
                info!(path, chars = text.chars().count(), "loaded startup prompt");
                Some(text)
            }
            Err(e) => {
                warn!(path, error = %e, "failed to read startup prompt");
                None
            }
        }
    }
}

fn default_activity() -> String {
    DEFAULT_ACTIVITY.to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `./relay.toml`. A missing
    /// default file is not an error as long as the env supplies the required
    /// keys; a missing explicit path is.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        if let Some(path) = config_path {
            std::fs::metadata(path)?;
        }
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        Self::figment(path)
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
