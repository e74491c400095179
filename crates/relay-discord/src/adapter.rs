use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relay_agent::pipeline::MessageQueue;
use relay_agent::Session;
use relay_core::config::DiscordConfig;

use crate::error::DiscordError;
use crate::handler::RelayHandler;
use crate::target::DiscordTarget;

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop until cancelled.
/// Reconnects whenever the gateway drops. A single queue worker outlives
/// every reconnect, so conversation order is kept across them.
pub struct DiscordAdapter {
    session: Arc<Session>,
    config: DiscordConfig,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, session: Arc<Session>) -> Result<Self, DiscordError> {
        if config.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self {
            session,
            config: config.clone(),
        })
    }

    /// Connect to Discord and keep reconnecting until `cancel` fires.
    ///
    /// Returns once the gateway is shut down and the queue worker has
    /// stopped.
    pub async fn run(self, cancel: CancellationToken) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let (queue, worker) = MessageQueue::<DiscordTarget>::new(Arc::clone(&self.session));
        let worker = tokio::spawn(worker.run(cancel.clone()));

        loop {
            let mut client = tokio::select! {
                _ = cancel.cancelled() => break,
                client = self.connect(&queue, intents) => client,
            };

            info!("Discord: gateway connecting");
            let shard_manager = Arc::clone(&client.shard_manager);

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Discord: shutting down gateway");
                    shard_manager.shutdown_all().await;
                    break;
                }
                result = client.start() => match result {
                    Ok(()) => info!("Discord: gateway stopped cleanly, reconnecting in 5s"),
                    Err(e) => warn!("Discord: gateway error ({e}), reconnecting in 5s"),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
        }

        drop(queue);
        match worker.await {
            Ok(processed) => info!(processed, "Discord: queue worker stopped"),
            Err(e) => error!(error = %e, "Discord: queue worker panicked"),
        }
    }

    /// Build a client, retrying every 30s until it succeeds.
    async fn connect(&self, queue: &MessageQueue<DiscordTarget>, intents: GatewayIntents) -> Client {
        loop {
            match self.build_client(queue, intents).await {
                Ok(c) => return c,
                Err(e) => {
                    error!("Discord: connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
    }

    /// Build a fresh serenity `Client` wired to the shared queue.
    async fn build_client(
        &self,
        queue: &MessageQueue<DiscordTarget>,
        intents: GatewayIntents,
    ) -> Result<Client, DiscordError> {
        let handler = RelayHandler {
            queue: queue.clone(),
            config: self.config.clone(),
            bot_id: OnceLock::new(),
        };

        let client = Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await?;
        Ok(client)
    }
}
