//! Error types for the gate crate.

use std::fmt;

/// Errors from the evaluation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The action's arguments were not a JSON object.
    ArgumentsNotObject { action_type: String },
    /// The judge tier could not produce an outcome.
    ///
    /// The gate treats this as requires-approval, never as auto-proceed.
    JudgeUnavailable { reason: String },
    /// A judge was required by configuration but none was supplied.
    JudgeNotConfigured,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentsNotObject { action_type } => {
                write!(f, "arguments for action '{action_type}' are not a JSON object")
            }
            Self::JudgeUnavailable { reason } => {
                write!(f, "judge unavailable: {reason}")
            }
            Self::JudgeNotConfigured => {
                write!(f, "judge tier required but no judge is configured")
            }
        }
    }
}

impl std::error::Error for GateError {}
