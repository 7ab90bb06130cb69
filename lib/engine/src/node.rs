//! Flow nodes and their configurations.
//!
//! Nodes are the building blocks of an agent's flow. Each node has:
//! - A unique ID within the flow
//! - A display name and canvas position (informational only)
//! - Configuration specific to its kind

use flowgate_ai::ModelFamily;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use ulid::Ulid;

/// A unique identifier for a node within a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("node_").unwrap_or(s);
        Ulid::from_str(raw).map(Self)
    }
}

/// Canvas position of a node. Informational only; never affects execution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single step in an agent's flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the flow.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Canvas position.
    #[serde(default)]
    pub position: Position,
    /// Kind-specific configuration.
    pub config: NodeConfig,
}

impl Node {
    /// Creates a new node with a random ID.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            position: Position::default(),
            config,
        }
    }

    /// Returns true if this node is an entry point by kind.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self.config, NodeConfig::Trigger)
    }
}

/// Configuration for each node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Entry point; its payload comes from the run invocation.
    Trigger,
    /// A language-model call over the accumulated conversation window.
    LlmStep {
        /// Which provider family serves this step.
        family: ModelFamily,
        /// System instructions for this step.
        system_instructions: String,
        /// Sampling temperature.
        temperature: Option<f32>,
        /// Maximum tokens to generate.
        max_tokens: Option<u32>,
    },
    /// A side-effecting integration action, subject to the evaluation gate.
    Action {
        /// The action type (e.g. "send_message").
        action_type: String,
        /// Argument template rendered against the execution context.
        args_template: JsonValue,
        /// When true, a failure of this node does not fail the run.
        #[serde(default)]
        non_critical: bool,
    },
    /// Conditional branching over context values.
    Branch {
        /// Ordered rules; the first matching rule selects its handle.
        rules: Vec<BranchRule>,
        /// Handle selected when no rule matches.
        fallback_handle: String,
    },
}

/// A single branch rule: a predicate guarding an output handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRule {
    /// The output handle selected when the predicate holds.
    pub handle: String,
    pub predicate: Predicate,
}

/// Comparison operators for branch predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// Substring match on strings, membership on arrays.
    Contains,
}

/// A pure predicate over a context value.
///
/// `path` addresses a context value (`user_message`, `memory:<key>`, or
/// `node:<id>` with an optional dotted JSON path); `op` compares it to
/// `value`. Evaluation has no side effects so branch selection stays
/// deterministic and replayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub path: String,
    pub op: PredicateOp,
    pub value: JsonValue,
}

impl Predicate {
    #[must_use]
    pub fn new(path: impl Into<String>, op: PredicateOp, value: JsonValue) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }

    /// Evaluates the predicate against a resolved context value.
    ///
    /// A missing value (`None`) never matches.
    #[must_use]
    pub fn evaluate(&self, resolved: Option<&JsonValue>) -> bool {
        let Some(actual) = resolved else {
            return false;
        };
        match self.op {
            PredicateOp::Eq => actual == &self.value,
            PredicateOp::Ne => actual != &self.value,
            PredicateOp::Gt => compare_numbers(actual, &self.value).is_some_and(|o| o.is_gt()),
            PredicateOp::Lt => compare_numbers(actual, &self.value).is_some_and(|o| o.is_lt()),
            PredicateOp::Ge => compare_numbers(actual, &self.value).is_some_and(|o| o.is_ge()),
            PredicateOp::Le => compare_numbers(actual, &self.value).is_some_and(|o| o.is_le()),
            PredicateOp::Contains => contains(actual, &self.value),
        }
    }
}

fn compare_numbers(left: &JsonValue, right: &JsonValue) -> Option<std::cmp::Ordering> {
    let left = left.as_f64()?;
    let right = right.as_f64()?;
    left.partial_cmp(&right)
}

fn contains(haystack: &JsonValue, needle: &JsonValue) -> bool {
    match haystack {
        JsonValue::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        JsonValue::Array(items) => items.contains(needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_id_display_and_parse() {
        let id = NodeId::new();
        let display = id.to_string();
        assert!(display.starts_with("node_"));
        let parsed: NodeId = display.parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn predicate_eq() {
        let p = Predicate::new("node:abc.category", PredicateOp::Eq, json!("urgent"));
        assert!(p.evaluate(Some(&json!("urgent"))));
        assert!(!p.evaluate(Some(&json!("routine"))));
        assert!(!p.evaluate(None));
    }

    #[test]
    fn predicate_numeric_comparison() {
        let p = Predicate::new("node:abc.score", PredicateOp::Ge, json!(80));
        assert!(p.evaluate(Some(&json!(92))));
        assert!(p.evaluate(Some(&json!(80))));
        assert!(!p.evaluate(Some(&json!(79.5))));
        // Non-numeric values never satisfy ordering comparisons.
        assert!(!p.evaluate(Some(&json!("high"))));
    }

    #[test]
    fn predicate_contains() {
        let string_contains = Predicate::new("user_message", PredicateOp::Contains, json!("meet"));
        assert!(string_contains.evaluate(Some(&json!("let's meet tomorrow"))));
        assert!(!string_contains.evaluate(Some(&json!("hello"))));

        let array_contains = Predicate::new("node:abc.tags", PredicateOp::Contains, json!("vip"));
        assert!(array_contains.evaluate(Some(&json!(["vip", "new"]))));
        assert!(!array_contains.evaluate(Some(&json!(["new"]))));
    }

    #[test]
    fn node_config_serde_roundtrip() {
        let node = Node::new(
            "Send reply",
            NodeConfig::Action {
                action_type: "send_message".to_string(),
                args_template: json!({ "recipient": "{{memory:owner_email}}", "body": "{{node:abc}}" }),
                non_critical: false,
            },
        );
        let json = serde_json::to_string(&node).expect("serialize");
        let parsed: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(node, parsed);
    }
}
