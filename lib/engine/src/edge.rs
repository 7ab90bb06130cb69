//! Edges of a flow graph.
//!
//! Edges connect nodes and optionally name the source handle they leave
//! from. Branch nodes use handles to distinguish their outcomes; other
//! node kinds emit on their single implicit handle.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A unique identifier for an edge within a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Ulid);

impl EdgeId {
    /// Creates a new random edge ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "edge_{}", self.0)
    }
}

/// A directed edge between two flow nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier within the flow.
    pub id: EdgeId,
    /// The source node.
    pub source: NodeId,
    /// The target node.
    pub target: NodeId,
    /// The source handle this edge leaves from (branch outcomes).
    pub source_handle: Option<String>,
    /// The target handle this edge arrives at (informational).
    pub target_handle: Option<String>,
}

impl Edge {
    /// Creates an edge on the implicit default handle.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    /// Creates an edge leaving a named source handle.
    #[must_use]
    pub fn from_handle(source: NodeId, handle: impl Into<String>, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            source_handle: Some(handle.into()),
            target_handle: None,
        }
    }

    /// Returns true if this edge leaves the given branch handle.
    ///
    /// Edges without a source handle match any selection, so a branch with
    /// a single unlabelled outgoing edge always forwards.
    #[must_use]
    pub fn matches_handle(&self, selected: &str) -> bool {
        self.source_handle
            .as_deref()
            .is_none_or(|h| h == selected)
    }
}
