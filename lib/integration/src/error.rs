//! Error types for the integration crate.

use std::fmt;

/// Errors from action adapter operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// No adapter registered for the action type.
    AdapterNotFound { action_type: String },
    /// The arguments were rejected by the adapter.
    InvalidArguments { reason: String },
    /// The external service reported a failure.
    ExternalServiceFailed { service: String, reason: String },
    /// The external call timed out.
    Timeout,
    /// The external service rate limited the call.
    RateLimited { retry_after_secs: Option<u64> },
}

impl AdapterError {
    /// Returns true if the caller may reasonably retry the same call.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited { .. } | Self::ExternalServiceFailed { .. }
        )
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterNotFound { action_type } => {
                write!(f, "no adapter registered for action type '{action_type}'")
            }
            Self::InvalidArguments { reason } => {
                write!(f, "invalid action arguments: {reason}")
            }
            Self::ExternalServiceFailed { service, reason } => {
                write!(f, "external service '{service}' failed: {reason}")
            }
            Self::Timeout => write!(f, "action call timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
        }
    }
}

impl std::error::Error for AdapterError {}
