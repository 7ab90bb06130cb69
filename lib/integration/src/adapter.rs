//! Adapter trait and registry.
//!
//! All integrations implement the [`ActionAdapter`] trait, providing a
//! uniform `execute(args) -> result | error` interface for external
//! service operations. Adapters are registered per action type.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Trait for side-effecting action adapters.
///
/// An adapter performs exactly one kind of external operation. The engine
/// never retries a failed adapter call on its own; retries happen through
/// an explicit resume by the caller.
#[async_trait]
pub trait ActionAdapter: Send + Sync {
    /// Executes the action with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the external operation fails.
    async fn execute(&self, args: JsonValue) -> Result<JsonValue, AdapterError>;

    /// Returns the action type this adapter serves (e.g. "send_message").
    fn action_type(&self) -> &str;
}

impl std::fmt::Debug for dyn ActionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionAdapter")
            .field("action_type", &self.action_type())
            .finish()
    }
}

/// Registry of action adapters, one per action type.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ActionAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own action type.
    pub fn register(&mut self, adapter: Arc<dyn ActionAdapter>) {
        self.adapters
            .insert(adapter.action_type().to_string(), adapter);
    }

    /// Resolves the adapter for an action type.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::AdapterNotFound`] if no adapter is registered.
    pub fn resolve(&self, action_type: &str) -> Result<Arc<dyn ActionAdapter>, AdapterError> {
        self.adapters
            .get(action_type)
            .cloned()
            .ok_or_else(|| AdapterError::AdapterNotFound {
                action_type: action_type.to_string(),
            })
    }

    /// Returns true if an adapter is registered for the action type.
    #[must_use]
    pub fn contains(&self, action_type: &str) -> bool {
        self.adapters.contains_key(action_type)
    }

    /// Returns the registered action types.
    pub fn action_types(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("action_types", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
