// End-to-end behaviour of the inbound queue: ordering, failure isolation,
// acknowledgement and delivery, driven through mock providers and targets.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_agent::persona::PersonaSet;
use relay_agent::pipeline::{
    DispatchError, MessageQueue, PlatformError, ReplyTarget, WorkerState,
};
use relay_agent::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError};
use relay_agent::Session;
use relay_core::config::ModelConfig;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Ack { channel: u64, ephemeral: bool },
    TypingStart(u64),
    TypingStop(u64),
    Sent { channel: u64, text: String },
}

type Log = Arc<Mutex<Vec<Event>>>;

struct MockTarget {
    channel: u64,
    author: u64,
    images: Vec<String>,
    fail_send: bool,
    log: Log,
}

impl MockTarget {
    fn new(channel: u64, log: &Log) -> Self {
        Self {
            channel,
            author: 7,
            images: Vec::new(),
            fail_send: false,
            log: Arc::clone(log),
        }
    }
}

struct TypingGuard {
    channel: u64,
    log: Log,
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.log.lock().unwrap().push(Event::TypingStop(self.channel));
    }
}

#[async_trait]
impl ReplyTarget for MockTarget {
    type Typing = TypingGuard;

    fn channel_id(&self) -> u64 {
        self.channel
    }

    fn author_id(&self) -> u64 {
        self.author
    }

    fn image_urls(&self) -> Vec<String> {
        self.images.clone()
    }

    async fn acknowledge(&self, ephemeral: bool) -> Result<(), DispatchError> {
        self.log.lock().unwrap().push(Event::Ack {
            channel: self.channel,
            ephemeral,
        });
        Ok(())
    }

    fn start_typing(&self) -> TypingGuard {
        self.log.lock().unwrap().push(Event::TypingStart(self.channel));
        TypingGuard {
            channel: self.channel,
            log: Arc::clone(&self.log),
        }
    }

    async fn send_split(&self, text: &str) -> Result<(), DispatchError> {
        if self.fail_send {
            let source: PlatformError = "send rejected".into();
            return Err(DispatchError::Send { sent: 0, source });
        }
        self.log.lock().unwrap().push(Event::Sent {
            channel: self.channel,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Replies `re: <text>` and fails on any text containing "boom".
struct ScriptedProvider {
    models_seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.models_seen.lock().unwrap().push(req.model.clone());
        let last = req
            .messages
            .last()
            .map(|m| m.content.text().to_string())
            .unwrap_or_default();
        if last.contains("boom") {
            return Err(ProviderError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            });
        }
        Ok(ChatResponse {
            content: format!("re: {last}"),
            model: req.model.clone(),
        })
    }
}

fn session() -> Arc<Session> {
    session_with_models().0
}

/// Session plus the list of model ids the provider was called with.
fn session_with_models() -> (Arc<Session>, Arc<Mutex<Vec<String>>>) {
    let models_seen = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider {
        models_seen: Arc::clone(&models_seen),
    };
    let models = ModelConfig {
        text: "text-model".to_string(),
        vision: "vision-model".to_string(),
    };
    let session = Session::new(Box::new(provider), models, PersonaSet::default());
    (Arc::new(session), models_seen)
}

fn sent_texts(log: &Log) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Sent { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Enqueue everything, close the queue and wait for the worker to finish.
async fn drain(session: Arc<Session>, items: Vec<(MockTarget, &str)>) -> u64 {
    let (queue, worker) = MessageQueue::new(session);
    let handle = tokio::spawn(worker.run(CancellationToken::new()));
    for (target, text) in items {
        queue.enqueue(target, text.to_string()).await.unwrap();
    }
    drop(queue);
    handle.await.unwrap()
}

#[tokio::test]
async fn hello_scenario() {
    let log = Log::default();
    let session = session();

    let processed = drain(Arc::clone(&session), vec![(MockTarget::new(1, &log), "Hello")]).await;
    assert_eq!(processed, 1);

    assert_eq!(sent_texts(&log), vec!["> **Hello** - <@7> \n\nre: Hello".to_string()]);
    assert_eq!(
        session.history().await,
        vec![Message::user("Hello"), Message::assistant("re: Hello")]
    );
}

#[tokio::test]
async fn items_are_processed_in_enqueue_order() {
    let log = Log::default();
    let items: Vec<_> = ["one", "two", "three", "four", "five"]
        .into_iter()
        .map(|t| (MockTarget::new(1, &log), t))
        .collect();

    let processed = drain(session(), items).await;
    assert_eq!(processed, 5);

    let replies: Vec<String> = sent_texts(&log)
        .into_iter()
        .map(|t| t.rsplit("\n\n").next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(replies, vec!["re: one", "re: two", "re: three", "re: four", "re: five"]);
}

#[tokio::test]
async fn provider_failure_does_not_stop_the_worker() {
    let log = Log::default();
    let items = vec![
        (MockTarget::new(1, &log), "boom"),
        (MockTarget::new(1, &log), "after"),
    ];

    let processed = drain(session(), items).await;
    assert_eq!(processed, 2);
    assert_eq!(sent_texts(&log), vec!["> **after** - <@7> \n\nre: after".to_string()]);
}

#[tokio::test]
async fn send_failure_does_not_stop_the_worker() {
    let log = Log::default();
    let mut broken = MockTarget::new(1, &log);
    broken.fail_send = true;
    let session = session();

    let processed = drain(
        Arc::clone(&session),
        vec![(broken, "first"), (MockTarget::new(2, &log), "second")],
    )
    .await;

    assert_eq!(processed, 2);
    assert_eq!(sent_texts(&log), vec!["> **second** - <@7> \n\nre: second".to_string()]);
    // The failed delivery still recorded its exchange.
    assert_eq!(session.history().await.len(), 4);
}

#[tokio::test]
async fn typing_indicator_wraps_each_item() {
    let log = Log::default();
    drain(session(), vec![(MockTarget::new(3, &log), "hi")]).await;

    let events: Vec<Event> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| !matches!(e, Event::Ack { .. }))
        .cloned()
        .collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Event::TypingStart(3));
    assert!(matches!(events[1], Event::Sent { channel: 3, .. }));
    assert_eq!(events[2], Event::TypingStop(3));
}

#[tokio::test]
async fn acknowledge_honours_private_mode_and_reply_all() {
    let log = Log::default();
    let session = session();
    session.set_private_replies(true);
    drain(Arc::clone(&session), vec![(MockTarget::new(5, &log), "a")]).await;
    assert!(log.lock().unwrap().contains(&Event::Ack {
        channel: 5,
        ephemeral: true
    }));

    let log = Log::default();
    let session = session_with_reply_all();
    drain(session, vec![(MockTarget::new(5, &log), "b")]).await;
    assert!(!log
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::Ack { .. })));
}

fn session_with_reply_all() -> Arc<Session> {
    let s = session();
    s.toggle_reply_all();
    s
}

#[tokio::test]
async fn worker_records_the_channel_it_serves() {
    let log = Log::default();
    let session = session();

    // Queued but not yet picked up: no channel context.
    let (queue, worker) = MessageQueue::new(Arc::clone(&session));
    queue.enqueue(MockTarget::new(11, &log), "x".to_string()).await.unwrap();
    assert_eq!(session.current_channel(), None);

    queue.enqueue(MockTarget::new(12, &log), "y".to_string()).await.unwrap();
    drop(queue);
    assert_eq!(worker.run(CancellationToken::new()).await, 2);
    assert_eq!(session.current_channel(), Some(12));
}

#[tokio::test]
async fn image_attachments_select_vision_model() {
    let log = Log::default();
    let (session, models_seen) = session_with_models();
    let mut target = MockTarget::new(1, &log);
    target.images = vec!["https://cdn.example/cat.png".to_string()];

    drain(
        Arc::clone(&session),
        vec![(target, "what is this?"), (MockTarget::new(1, &log), "thanks")],
    )
    .await;

    assert_eq!(
        *models_seen.lock().unwrap(),
        vec!["vision-model".to_string(), "text-model".to_string()]
    );
    let history = session.history().await;
    assert!(history[0].content.has_images());
    assert!(!history[2].content.has_images());
}

#[tokio::test]
async fn cancellation_stops_an_idle_worker() {
    let (queue, worker) = MessageQueue::<MockTarget>::new(session());
    let mut state = worker.state();
    assert_eq!(*state.borrow_and_update(), WorkerState::Idle);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let log = Log::default();
    queue.enqueue(MockTarget::new(1, &log), "ping".to_string()).await.unwrap();
    state
        .wait_for(|s| *s == WorkerState::Waiting)
        .await
        .unwrap();

    cancel.cancel();
    assert_eq!(handle.await.unwrap(), 1);
    // The producer handle is still alive; the worker stopped on the token alone.
    drop(queue);
}
