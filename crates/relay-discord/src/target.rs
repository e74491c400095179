//! Discord implementation of the pipeline's reply target.
//!
//! A target is built from either a plain channel message or a `/chat`
//! interaction. Messages reply into their channel; interactions are deferred
//! on enqueue and answered with follow-ups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage,
};
use serenity::http::{Http, Typing};
use serenity::model::application::CommandInteraction;
use serenity::model::channel::{Attachment, Message};
use serenity::model::id::{ChannelId, UserId};

use relay_agent::pipeline::{DispatchError, ReplyTarget};

use crate::send::split_chunks;

enum Origin {
    Message,
    Interaction {
        command: Box<CommandInteraction>,
        ephemeral: AtomicBool,
    },
}

pub struct DiscordTarget {
    http: Arc<Http>,
    channel_id: ChannelId,
    author_id: UserId,
    image_urls: Vec<String>,
    origin: Origin,
}

impl DiscordTarget {
    pub fn from_message(http: Arc<Http>, msg: &Message) -> Self {
        Self {
            http,
            channel_id: msg.channel_id,
            author_id: msg.author.id,
            image_urls: image_urls(&msg.attachments),
            origin: Origin::Message,
        }
    }

    pub fn from_interaction(http: Arc<Http>, command: &CommandInteraction) -> Self {
        Self {
            http,
            channel_id: command.channel_id,
            author_id: command.user.id,
            image_urls: Vec::new(),
            origin: Origin::Interaction {
                command: Box::new(command.clone()),
                ephemeral: AtomicBool::new(false),
            },
        }
    }
}

/// URLs of the image attachments. Other files are not forwarded to the model.
pub fn image_urls(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .filter(|a| is_image(a.content_type.as_deref(), &a.filename))
        .map(|a| a.url.clone())
        .collect()
}

fn is_image(content_type: Option<&str>, filename: &str) -> bool {
    if let Some(ct) = content_type {
        return ct.starts_with("image/");
    }
    let lower = filename.to_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

#[async_trait]
impl ReplyTarget for DiscordTarget {
    type Typing = Typing;

    fn channel_id(&self) -> u64 {
        self.channel_id.get()
    }

    fn author_id(&self) -> u64 {
        self.author_id.get()
    }

    fn image_urls(&self) -> Vec<String> {
        self.image_urls.clone()
    }

    async fn acknowledge(&self, ephemeral: bool) -> Result<(), DispatchError> {
        let Origin::Interaction {
            command,
            ephemeral: flag,
        } = &self.origin
        else {
            return Ok(());
        };

        flag.store(ephemeral, Ordering::Relaxed);
        let defer = CreateInteractionResponseMessage::new().ephemeral(ephemeral);
        command
            .create_response(&self.http, CreateInteractionResponse::Defer(defer))
            .await
            .map_err(|e| DispatchError::Acknowledge(Box::new(e)))
    }

    fn start_typing(&self) -> Typing {
        self.channel_id.start_typing(&self.http)
    }

    async fn send_split(&self, text: &str) -> Result<(), DispatchError> {
        let mut sent = 0;
        for chunk in split_chunks(text) {
            let result = match &self.origin {
                Origin::Message => self.channel_id.say(&self.http, chunk).await.map(|_| ()),
                Origin::Interaction { command, ephemeral } => {
                    let followup = CreateInteractionResponseFollowup::new()
                        .content(chunk)
                        .ephemeral(ephemeral.load(Ordering::Relaxed));
                    command
                        .create_followup(&self.http, followup)
                        .await
                        .map(|_| ())
                }
            };
            result.map_err(|e| DispatchError::Send {
                sent,
                source: Box::new(e),
            })?;
            sent += 1;
        }
        Ok(())
    }
}
