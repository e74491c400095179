//! relay-bot: a Discord bot that relays channel messages to an OpenAI chat
//! model and posts the replies back, one message at a time.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay_agent::openai::OpenAiProvider;
use relay_agent::persona::PersonaSet;
use relay_agent::Session;
use relay_core::RelayConfig;
use relay_discord::DiscordAdapter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_bot=info,relay_discord=info,relay_agent=info".into()),
        )
        .init();

    let args = Args::parse();

    // load config: --config / RELAY_CONFIG > ./relay.toml, RELAY_* env on top
    let config = match RelayConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(code = e.code(), "config load failed: {e}");
            return Err(e.into());
        }
    };

    info!(
        base_url = %config.openai.base_url,
        text_model = %config.model.text,
        vision_model = %config.model.vision,
        personas = config.personas.len(),
        "LLM provider: OpenAI"
    );
    let provider = OpenAiProvider::new(
        config.openai.api_key.clone(),
        Some(config.openai.base_url.clone()),
    );

    let session = Session::new(
        Box::new(provider),
        config.model.clone(),
        PersonaSet::new(config.personas.clone()),
    )
    .with_reply_all(config.discord.reply_all)
    .with_private_replies(config.discord.private_replies)
    .with_startup_prompt(config.prompt.load_startup());

    let adapter = DiscordAdapter::new(&config.discord, Arc::new(session))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
        }
    });

    info!("Discord bot starting");
    adapter.run(cancel).await;
    info!("relay-bot stopped");
    Ok(())
}
