//! Provider registry keyed by model family.
//!
//! Flow nodes are configured with a model family, not a concrete provider;
//! the application registers one backend per family at startup and the
//! engine resolves through this registry at execution time.

use crate::backend::LlmBackend;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A family of models a node can be configured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Anthropic Claude models.
    Claude,
    /// OpenAI GPT models.
    Gpt,
    /// Locally hosted models (Ollama and compatible).
    Local,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claude => write!(f, "claude"),
            Self::Gpt => write!(f, "gpt"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Registry of LLM backends, one per model family.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    backends: HashMap<ModelFamily, Arc<dyn LlmBackend>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend for a model family, replacing any previous one.
    pub fn register(&mut self, family: ModelFamily, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(family, backend);
    }

    /// Resolves the backend for a model family.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ProviderUnavailable`] if no backend is registered
    /// for the family.
    pub fn resolve(&self, family: ModelFamily) -> Result<Arc<dyn LlmBackend>, LlmError> {
        self.backends
            .get(&family)
            .cloned()
            .ok_or_else(|| LlmError::ProviderUnavailable {
                provider: family.to_string(),
                reason: "no backend registered".to_string(),
            })
    }

    /// Returns true if a backend is registered for the family.
    #[must_use]
    pub fn contains(&self, family: ModelFamily) -> bool {
        self.backends.contains_key(&family)
    }

    /// Returns the registered families.
    pub fn families(&self) -> impl Iterator<Item = ModelFamily> + '_ {
        self.backends.keys().copied()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("families", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
