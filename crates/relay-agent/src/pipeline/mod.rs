//! Message pipeline: inbound queue → resolver → dispatcher.
//!
//! Platform adapters implement [`ReplyTarget`] and feed a [`MessageQueue`];
//! everything else here is platform-agnostic.

pub mod dispatch;
pub mod queue;
pub mod resolve;
pub mod target;

pub use dispatch::{format_reply, send_message};
pub use queue::{MessageQueue, QueueClosed, QueueItem, QueueWorker, WorkerState};
pub use resolve::{resolve_response, select_model};
pub use target::{DispatchError, PlatformError, ReplyTarget};
