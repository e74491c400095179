//! Inbound queue and its single consumer.
//!
//! Event handlers push [`QueueItem`]s through a [`MessageQueue`]; one
//! [`QueueWorker`] task drains them in FIFO order. Each item is handled
//! fire-and-forget: failures are logged and the worker moves on, so a bad
//! item never blocks the queue and nothing is redelivered (at-most-once).
//!
//! There is no timeout on the LLM call. A hung request stalls every item
//! behind it.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::session::Session;

use super::dispatch::send_message;
use super::target::ReplyTarget;

/// One pending inbound message awaiting a reply.
pub struct QueueItem<T> {
    pub target: T,
    pub text: String,
}

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing has been queued yet.
    Idle,
    /// Processing an item.
    Draining,
    /// Queue drained, blocked on the next item.
    Waiting,
}

#[derive(Debug, thiserror::Error)]
#[error("message queue is closed")]
pub struct QueueClosed;

/// Producer handle. Cheap to clone; the worker stops once every handle is dropped.
pub struct MessageQueue<T> {
    tx: mpsc::UnboundedSender<QueueItem<T>>,
    session: Arc<Session>,
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            session: Arc::clone(&self.session),
        }
    }
}

impl<T: ReplyTarget> MessageQueue<T> {
    /// Create a queue and the worker that drains it.
    pub fn new(session: Arc<Session>) -> (Self, QueueWorker<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        let worker = QueueWorker {
            rx,
            session: Arc::clone(&session),
            state: state_tx,
        };
        (Self { tx, session }, worker)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Acknowledge the event (skipped in reply-all mode) and push it onto the
    /// queue.
    ///
    /// A failed acknowledgement is logged; the item is still queued.
    pub async fn enqueue(&self, target: T, text: String) -> Result<(), QueueClosed> {
        if !self.session.reply_all() {
            if let Err(e) = target.acknowledge(self.session.private_replies()).await {
                warn!(channel = target.channel_id(), error = %e, "failed to acknowledge event");
            }
        }

        debug!(channel = target.channel_id(), "message queued");
        self.tx
            .send(QueueItem { target, text })
            .map_err(|_| QueueClosed)
    }
}

/// Single consumer of the inbound queue.
pub struct QueueWorker<T> {
    rx: mpsc::UnboundedReceiver<QueueItem<T>>,
    session: Arc<Session>,
    state: watch::Sender<WorkerState>,
}

impl<T: ReplyTarget> QueueWorker<T> {
    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Drain the queue until `cancel` fires or every producer is dropped.
    ///
    /// Returns the number of items taken off the queue.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        info!("message worker started");
        let mut processed = 0u64;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(processed, "message worker cancelled");
                    break;
                }
                item = self.rx.recv() => match item {
                    Some(item) => item,
                    None => {
                        info!(processed, "message queue closed, worker exiting");
                        break;
                    }
                },
            };

            self.state.send_replace(WorkerState::Draining);
            process(&self.session, item).await;
            processed += 1;

            if self.rx.is_empty() {
                self.state.send_replace(WorkerState::Waiting);
            }
        }

        processed
    }
}

/// Handle one item under a typing indicator. Never fails.
///
/// The worker is the only writer of the session's current channel.
async fn process<T: ReplyTarget>(session: &Session, item: QueueItem<T>) {
    session.set_current_channel(item.target.channel_id());
    let _typing = item.target.start_typing();
    if let Err(e) = send_message(session, &item.target, &item.text).await {
        error!(
            channel = item.target.channel_id(),
            author = item.target.author_id(),
            provider = session.provider().name(),
            error = %e,
            "error while processing message"
        );
    }
}
