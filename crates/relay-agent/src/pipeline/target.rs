//! Platform-side handle for one inbound event.
//!
//! The queue and dispatcher only talk to the chat platform through this trait,
//! so the pipeline stays platform-agnostic. `relay-discord` implements it for
//! serenity messages and slash-command interactions.

use async_trait::async_trait;

/// Boxed platform error carried through the pipeline.
pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] PlatformError),

    #[error("send failed after {sent} chunk(s): {source}")]
    Send {
        sent: usize,
        #[source]
        source: PlatformError,
    },
}

#[async_trait]
pub trait ReplyTarget: Send + Sync + 'static {
    /// Guard that keeps a typing indicator alive until dropped.
    type Typing: Send;

    fn channel_id(&self) -> u64;

    fn author_id(&self) -> u64;

    /// URLs of image attachments on the originating event.
    fn image_urls(&self) -> Vec<String>;

    /// Acknowledge the event before it is queued (e.g. defer an interaction).
    async fn acknowledge(&self, ephemeral: bool) -> Result<(), DispatchError>;

    fn start_typing(&self) -> Self::Typing;

    /// Deliver `text`, split into ordered platform-sized messages.
    async fn send_split(&self, text: &str) -> Result<(), DispatchError>;
}
