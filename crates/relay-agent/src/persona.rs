//! Named priming prompts selectable at runtime.

use std::collections::BTreeMap;

use crate::provider::ProviderError;

/// Persona active at startup and after every reset. Carries no prompt.
pub const DEFAULT_PERSONA: &str = "standard";

/// Immutable set of configured personas.
#[derive(Debug, Clone, Default)]
pub struct PersonaSet {
    prompts: BTreeMap<String, String>,
}

impl PersonaSet {
    pub fn new(prompts: BTreeMap<String, String>) -> Self {
        Self { prompts }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_PERSONA || self.prompts.contains_key(name)
    }

    /// Priming prompt for `name`, if it has one.
    pub fn prompt(&self, name: &str) -> Option<&str> {
        self.prompts
            .get(name)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    /// All selectable names, `standard` first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(DEFAULT_PERSONA)
            .chain(
                self.prompts
                    .keys()
                    .map(String::as_str)
                    .filter(|n| *n != DEFAULT_PERSONA),
            )
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("unknown persona: {0}")]
    Unknown(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
