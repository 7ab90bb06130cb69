//! Error types for the conversation crate.

use std::fmt;

/// Errors from conversation context operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// The requested conversation could not be found.
    NotFound { conversation_id: String },
    /// A memory entry could not be decoded.
    InvalidMemoryEntry { key: String, reason: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { conversation_id } => {
                write!(f, "conversation not found: {conversation_id}")
            }
            Self::InvalidMemoryEntry { key, reason } => {
                write!(f, "invalid memory entry '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}
