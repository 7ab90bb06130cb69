//! Core domain types and utilities for the flowgate engine.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used throughout the flowgate agent-flow execution engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AgentId, ConfirmationId, ConversationId, MessageId, NodeExecutionId, RunId};
