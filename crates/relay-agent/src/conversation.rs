//! Rolling conversation history sent as LLM context.
//!
//! The history is capped at [`MAX_HISTORY`] entries. Overflow does not trim
//! the oldest or newest entries: it drops the fixed window [`PRUNE_RANGE`],
//! which keeps the first few turns (startup prompt, persona priming) intact.
//! It is unclear whether that window was chosen on purpose; it is kept exactly.

use std::ops::Range;

use crate::provider::Message;

/// Maximum number of entries retained after an append.
pub const MAX_HISTORY: usize = 26;

/// Positions removed when the history overflows.
pub const PRUNE_RANGE: Range<usize> = 4..6;

/// Ordered, role-tagged conversation entries. Insertion order is chronological.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    entries: Vec<Message>,
    generation: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and prune if the history grew past the cap.
    pub fn append(&mut self, entry: Message) {
        self.entries.push(entry);
        self.prune();
    }

    /// Drop the entries at [`PRUNE_RANGE`] while the history exceeds [`MAX_HISTORY`].
    ///
    /// Appends happen one at a time, so in practice this removes one window.
    pub fn prune(&mut self) {
        while self.entries.len() > MAX_HISTORY {
            self.entries.drain(PRUNE_RANGE);
        }
    }

    /// Clear the history and start a new generation.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    /// Bumped on every reset. A reply computed against an older generation
    /// belongs to a history that no longer exists.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
