//! Resume seeding and the approval protocol types.
//!
//! A resume replays a prior run's outputs for everything strictly
//! upstream of the retry target instead of re-executing it, so completed
//! side effects are never repeated. Seeding is all-or-nothing: every
//! strict ancestor must either have a seeded output or be provably
//! skipped by a seeded branch selection.

use crate::context::NodeOutput;
use crate::edge::EdgeId;
use crate::error::GraphInputError;
use crate::graph::FlowGraph;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// The (retry target, prior outputs) pair used to replay a run from a
/// specific point without recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySeed {
    /// The node to re-execute.
    pub retry_from: NodeId,
    /// Per-node outputs from the prior run.
    pub previous_outputs: HashMap<NodeId, NodeOutput>,
}

impl RetrySeed {
    #[must_use]
    pub fn new(retry_from: NodeId, previous_outputs: HashMap<NodeId, NodeOutput>) -> Self {
        Self {
            retry_from,
            previous_outputs,
        }
    }
}

/// An external decision on a pending confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConfirmationDecision {
    /// Execute the action with its original rendered arguments.
    Approved,
    /// Execute the action with edited arguments replacing the originals.
    ApprovedWithEdits { args: JsonValue },
    /// Do not execute; the node and its sole dependents are skipped.
    Rejected,
}

/// How each strict ancestor of the retry target is handled during
/// seeding.
#[derive(Debug, Clone)]
pub(crate) struct SeedPlan {
    /// Ancestors whose outputs are replayed, in definition order.
    pub reused: Vec<NodeId>,
    /// Ancestors proven skipped by seeded branch selections, in
    /// definition order.
    pub skipped: Vec<NodeId>,
    /// Outgoing edges of reused ancestors that count as satisfied
    /// (branch ancestors satisfy only their seeded selected handle).
    pub satisfied_edges: Vec<EdgeId>,
    /// Unselected-handle edges of seeded branch ancestors.
    pub dead_edges: HashSet<EdgeId>,
}

/// Classifies the strict ancestors of the retry target.
///
/// # Errors
///
/// Returns [`GraphInputError::RetryTargetNotFound`] if the target is not
/// in the graph, or [`GraphInputError::MissingSeedOutput`] for any
/// ancestor that is neither seeded nor provably skipped.
pub(crate) fn classify_seed(
    graph: &FlowGraph,
    seed: &RetrySeed,
) -> Result<SeedPlan, GraphInputError> {
    if graph.get_node(seed.retry_from).is_none() {
        return Err(GraphInputError::RetryTargetNotFound {
            node_id: seed.retry_from,
        });
    }

    let ancestors = graph.ancestors_of(seed.retry_from);

    // Unselected handles of seeded branch decisions are dead.
    let mut dead_edges = HashSet::new();
    for &ancestor in &ancestors {
        if let Some(NodeOutput::BranchResult { selected_handle }) =
            seed.previous_outputs.get(&ancestor)
        {
            for edge in graph.outgoing_edges(ancestor) {
                if !edge.matches_handle(selected_handle) {
                    dead_edges.insert(edge.id);
                }
            }
        }
    }

    // An ancestor is skipped when every incoming edge is dead or comes
    // from a skipped ancestor. Iterate to a fixpoint so skips propagate.
    let mut skipped_set: HashSet<NodeId> = HashSet::new();
    loop {
        let mut changed = false;
        for &ancestor in &ancestors {
            if skipped_set.contains(&ancestor) {
                continue;
            }
            let incoming = graph.incoming_edges(ancestor);
            if incoming.is_empty() {
                continue;
            }
            let all_dead = incoming
                .iter()
                .all(|e| dead_edges.contains(&e.id) || skipped_set.contains(&e.source));
            if all_dead {
                skipped_set.insert(ancestor);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut reused = Vec::new();
    let mut skipped = Vec::new();
    let mut satisfied_edges = Vec::new();
    for node in graph.nodes() {
        if !ancestors.contains(&node.id) {
            continue;
        }
        if skipped_set.contains(&node.id) {
            skipped.push(node.id);
            continue;
        }
        let Some(output) = seed.previous_outputs.get(&node.id) else {
            return Err(GraphInputError::MissingSeedOutput { node_id: node.id });
        };
        reused.push(node.id);
        for edge in graph.outgoing_edges(node.id) {
            let selected = match output {
                NodeOutput::BranchResult { selected_handle } => {
                    edge.matches_handle(selected_handle)
                }
                _ => true,
            };
            if selected {
                satisfied_edges.push(edge.id);
            }
        }
    }

    Ok(SeedPlan {
        reused,
        skipped,
        satisfied_edges,
        dead_edges,
    })
}
