//! Explicit session context shared by every pipeline component.
//!
//! Holds the conversation, the persona selector, the current channel and the
//! runtime toggles. Exchanges (user append, LLM call, assistant append) are
//! serialized by their own lock, so the queue worker, the startup prompt and
//! persona priming never interleave. The conversation lock itself is only
//! held for the appends, which keeps `reset` fast while a call is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::info;

use relay_core::config::ModelConfig;

use crate::conversation::Conversation;
use crate::persona::{PersonaError, PersonaSet, DEFAULT_PERSONA};
use crate::pipeline::resolve::resolve_response;
use crate::provider::{LlmProvider, Message, ProviderError};

pub struct Session {
    provider: Box<dyn LlmProvider>,
    models: ModelConfig,
    personas: PersonaSet,
    conversation: Mutex<Conversation>,
    exchange: Mutex<()>,
    persona: RwLock<String>,
    current_channel: RwLock<Option<u64>>,
    reply_all: AtomicBool,
    private_replies: AtomicBool,
    startup_prompt: Option<String>,
    startup_sent: AtomicBool,
}

impl Session {
    pub fn new(provider: Box<dyn LlmProvider>, models: ModelConfig, personas: PersonaSet) -> Self {
        Self {
            provider,
            models,
            personas,
            conversation: Mutex::new(Conversation::new()),
            exchange: Mutex::new(()),
            persona: RwLock::new(DEFAULT_PERSONA.to_string()),
            current_channel: RwLock::new(None),
            reply_all: AtomicBool::new(false),
            private_replies: AtomicBool::new(false),
            startup_prompt: None,
            startup_sent: AtomicBool::new(false),
        }
    }

    pub fn with_reply_all(self, on: bool) -> Self {
        self.reply_all.store(on, Ordering::Relaxed);
        self
    }

    pub fn with_private_replies(self, on: bool) -> Self {
        self.private_replies.store(on, Ordering::Relaxed);
        self
    }

    pub fn with_startup_prompt(mut self, prompt: Option<String>) -> Self {
        self.startup_prompt = prompt;
        self
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    pub fn personas(&self) -> &PersonaSet {
        &self.personas
    }

    /// Run one exchange against the shared conversation and return the reply.
    pub async fn resolve(&self, text: &str, image_urls: &[String]) -> Result<String, ProviderError> {
        let _turn = self.exchange.lock().await;
        resolve_response(
            &self.conversation,
            self.provider.as_ref(),
            &self.models,
            text,
            image_urls,
        )
        .await
    }

    /// Clear the history and restore the default persona.
    ///
    /// Does not wait for an in-flight exchange; its reply is discarded.
    pub async fn reset(&self) {
        self.conversation.lock().await.reset();
        *self.persona.write().unwrap_or_else(PoisonError::into_inner) = DEFAULT_PERSONA.to_string();
        info!("conversation history reset");
    }

    /// Reset, select `name`, and prime the conversation with its prompt.
    ///
    /// Returns the model's reply to the priming prompt, or `None` for a
    /// persona without one.
    pub async fn switch_persona(&self, name: &str) -> Result<Option<String>, PersonaError> {
        if !self.personas.contains(name) {
            return Err(PersonaError::Unknown(name.to_string()));
        }

        self.reset().await;
        *self.persona.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
        info!(persona = name, "persona switched");

        match self.personas.prompt(name) {
            Some(prompt) => Ok(Some(self.resolve(prompt, &[]).await?)),
            None => Ok(None),
        }
    }

    pub fn persona(&self) -> String {
        self.persona
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Channel of the item the worker is serving, or served last.
    /// Informational: replies are always routed through the item's own target.
    pub fn current_channel(&self) -> Option<u64> {
        *self
            .current_channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_current_channel(&self, channel_id: u64) {
        *self
            .current_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(channel_id);
    }

    pub fn reply_all(&self) -> bool {
        self.reply_all.load(Ordering::Relaxed)
    }

    /// Flip reply-all mode and return the new value.
    pub fn toggle_reply_all(&self) -> bool {
        !self.reply_all.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn private_replies(&self) -> bool {
        self.private_replies.load(Ordering::Relaxed)
    }

    pub fn set_private_replies(&self, on: bool) {
        self.private_replies.store(on, Ordering::Relaxed);
    }

    pub fn startup_prompt(&self) -> Option<&str> {
        self.startup_prompt.as_deref()
    }

    /// True exactly once per process: the first caller sends the startup prompt.
    pub fn claim_startup(&self) -> bool {
        !self.startup_sent.swap(true, Ordering::AcqRel)
    }

    pub async fn history(&self) -> Vec<Message> {
        self.conversation.lock().await.entries().to_vec()
    }
}
