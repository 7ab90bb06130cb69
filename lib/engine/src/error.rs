//! Error taxonomy for flow execution.
//!
//! Every run finalizes with at most one of these; a run is never left
//! ambiguously open. Collaborator failures (LLM providers, adapters) are
//! wrapped into `NodeExecution` with their retryability preserved.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Problems with the run's inputs, rejected before any node executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GraphInputError {
    /// An edge references a node that is not in the graph.
    UnknownNode { node_id: NodeId },
    /// The graph has nodes but no entry node.
    NoEntryNode,
    /// The resume target is not in the graph.
    RetryTargetNotFound { node_id: NodeId },
    /// A strict ancestor of the resume target has no seeded output and is
    /// not provably skipped by seeded branch selections.
    MissingSeedOutput { node_id: NodeId },
    /// The confirmation target is not an action node.
    NotAnActionNode { node_id: NodeId },
}

impl fmt::Display for GraphInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode { node_id } => {
                write!(f, "edge references unknown node {node_id}")
            }
            Self::NoEntryNode => write!(f, "graph has no entry node"),
            Self::RetryTargetNotFound { node_id } => {
                write!(f, "retry target {node_id} not found in graph")
            }
            Self::MissingSeedOutput { node_id } => {
                write!(f, "no seeded output for upstream node {node_id}")
            }
            Self::NotAnActionNode { node_id } => {
                write!(f, "confirmation target {node_id} is not an action node")
            }
        }
    }
}

impl std::error::Error for GraphInputError {}

/// The failure that finalized a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowError {
    /// Malformed graph or bad resume seed.
    GraphInput(GraphInputError),
    /// A node executor failed.
    NodeExecution {
        node_id: NodeId,
        message: String,
        /// Whether the caller may reasonably retry via resume.
        retryable: bool,
    },
    /// The evaluation gate hard-blocked an action.
    GateBlock { node_id: NodeId, reason: String },
    /// The step budget was exhausted before traversal finished.
    BudgetExceeded { budget: u32 },
    /// The run was cancelled between node executions.
    Cancelled,
}

impl FlowError {
    /// Returns true if the caller may reasonably retry this run.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::NodeExecution { retryable: true, .. })
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphInput(err) => write!(f, "graph input error: {err}"),
            Self::NodeExecution {
                node_id,
                message,
                retryable,
            } => {
                write!(
                    f,
                    "node {node_id} failed ({}): {message}",
                    if *retryable { "retryable" } else { "permanent" }
                )
            }
            Self::GateBlock { node_id, reason } => {
                write!(f, "gate blocked action at node {node_id}: {reason}")
            }
            Self::BudgetExceeded { budget } => {
                write!(f, "step budget of {budget} exhausted")
            }
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<GraphInputError> for FlowError {
    fn from(err: GraphInputError) -> Self {
        Self::GraphInput(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let retryable = FlowError::NodeExecution {
            node_id: NodeId::new(),
            message: "rate limited".to_string(),
            retryable: true,
        };
        assert!(retryable.retryable());

        let permanent = FlowError::NodeExecution {
            node_id: NodeId::new(),
            message: "bad prompt".to_string(),
            retryable: false,
        };
        assert!(!permanent.retryable());
        assert!(!FlowError::Cancelled.retryable());
        assert!(!FlowError::BudgetExceeded { budget: 10 }.retryable());
    }

    #[test]
    fn display_includes_node() {
        let node_id = NodeId::new();
        let err = FlowError::GateBlock {
            node_id,
            reason: "unresolved placeholder".to_string(),
        };
        assert!(err.to_string().contains(&node_id.to_string()));
    }

    #[test]
    fn flow_error_serde_roundtrip() {
        let err = FlowError::GraphInput(GraphInputError::MissingSeedOutput {
            node_id: NodeId::new(),
        });
        let json = serde_json::to_string(&err).expect("serialize");
        let parsed: FlowError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, parsed);
    }
}
