//! Conversation history and agent memory for the flowgate platform.
//!
//! This crate provides the read-side context that a flow run executes
//! against:
//!
//! - **Conversation window**: a bounded view of recent conversation turns
//! - **Agent memory**: durable key/category/value entries, read-only during a run

pub mod error;
pub mod memory;
pub mod message;

pub use error::ConversationError;
pub use memory::{MemoryEntry, MemoryView};
pub use message::{ConversationWindow, Turn, TurnRole};
