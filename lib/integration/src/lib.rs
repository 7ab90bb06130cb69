//! Integration adapters for the flowgate platform.
//!
//! Every side-effecting action type (message send, calendar-event create,
//! document append, ...) is backed by one [`ActionAdapter`] supplied by the
//! surrounding application. The engine resolves adapters through the
//! [`AdapterRegistry`] and never talks to external services directly.

pub mod adapter;
pub mod error;

pub use adapter::{ActionAdapter, AdapterRegistry};
pub use error::AdapterError;
