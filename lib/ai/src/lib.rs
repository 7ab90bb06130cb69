//! LLM primitives for the flowgate platform.
//!
//! This crate provides the language-model seam the engine executes against:
//!
//! - **Backend**: the `LlmBackend` trait with request/response types
//! - **Registry**: a pluggable provider registry keyed by model family
//!
//! Concrete HTTP providers are supplied by the surrounding application;
//! the engine only ever talks to the trait.

pub mod backend;
pub mod error;
pub mod registry;

pub use backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage};
pub use error::LlmError;
pub use registry::{ModelFamily, ProviderRegistry};
