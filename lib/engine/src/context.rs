//! Per-run execution context.
//!
//! The context carries everything a node executor may read: the bounded
//! conversation window, the read-only memory view, the triggering user
//! message, and the outputs accumulated from already-executed nodes. A
//! context is exclusively owned by one run.

use crate::node::NodeId;
use flowgate_ai::TokenUsage;
use flowgate_conversation::{ConversationWindow, MemoryView};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid template regex"));

/// The typed output of a node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeOutput {
    /// A language-model response.
    AiResponse { content: String, usage: TokenUsage },
    /// The result of an integration action.
    ActionResult {
        success: bool,
        data: Option<JsonValue>,
        error: Option<String>,
    },
    /// A branch decision.
    BranchResult { selected_handle: String },
    /// The entry node's payload.
    TriggerResult { payload: JsonValue },
}

impl NodeOutput {
    /// Returns the output as a JSON value for path resolution.
    #[must_use]
    pub fn as_json(&self) -> JsonValue {
        match self {
            Self::AiResponse { content, .. } => JsonValue::String(content.clone()),
            Self::ActionResult { data, .. } => data.clone().unwrap_or(JsonValue::Null),
            Self::BranchResult { selected_handle } => JsonValue::String(selected_handle.clone()),
            Self::TriggerResult { payload } => payload.clone(),
        }
    }

    /// Returns the output rendered as template text.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self.as_json() {
            JsonValue::String(s) => s,
            JsonValue::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// The accumulated state a run executes against.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Bounded window of recent conversation turns.
    pub conversation: ConversationWindow,
    /// Read-only agent memory.
    pub memory: MemoryView,
    /// The user message that triggered this run.
    pub user_message: String,
    /// Outputs of already-executed (or replayed) nodes.
    pub outputs: HashMap<NodeId, NodeOutput>,
}

impl ExecutionContext {
    /// Creates a context for a run triggered by a user message.
    #[must_use]
    pub fn new(
        conversation: ConversationWindow,
        memory: MemoryView,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            conversation,
            memory,
            user_message: user_message.into(),
            outputs: HashMap::new(),
        }
    }

    /// Records a node's output.
    pub fn record_output(&mut self, node_id: NodeId, output: NodeOutput) {
        self.outputs.insert(node_id, output);
    }

    /// Returns a recorded output.
    #[must_use]
    pub fn output(&self, node_id: NodeId) -> Option<&NodeOutput> {
        self.outputs.get(&node_id)
    }

    /// Resolves a predicate path against the context.
    ///
    /// Paths: `user_message`, `memory:<key>`, or `node:<id>` followed by an
    /// optional dotted JSON path (`node:<id>.category`).
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<JsonValue> {
        if path == "user_message" {
            return Some(JsonValue::String(self.user_message.clone()));
        }
        if let Some(key) = path.strip_prefix("memory:") {
            return self.memory.get(key).map(|e| e.value.clone());
        }
        if let Some(rest) = path.strip_prefix("node:") {
            let (id_part, json_path) = match rest.split_once('.') {
                Some((id, tail)) => (id, Some(tail)),
                None => (rest, None),
            };
            let node_id: NodeId = id_part.parse().ok()?;
            let mut value = self.outputs.get(&node_id)?.as_json();
            if let Some(json_path) = json_path {
                for segment in json_path.split('.') {
                    value = value.get(segment)?.clone();
                }
            }
            return Some(value);
        }
        None
    }

    /// Renders a string template against the context.
    ///
    /// `{{node:<id>}}`, `{{user_message}}`, and `{{memory:<key>}}`
    /// references are substituted; anything unresolvable is left in place
    /// for the gate's placeholder assertion to catch.
    #[must_use]
    pub fn render_template(&self, template: &str) -> String {
        TEMPLATE_RE
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let reference = &caps[1];
                match self.resolve_path(reference) {
                    Some(JsonValue::String(s)) => s,
                    Some(JsonValue::Null) | None => caps[0].to_string(),
                    Some(other) => other.to_string(),
                }
            })
            .into_owned()
    }

    /// Renders every string leaf of a JSON argument template.
    #[must_use]
    pub fn render_args(&self, template: &JsonValue) -> JsonValue {
        match template {
            JsonValue::String(s) => JsonValue::String(self.render_template(s)),
            JsonValue::Array(items) => {
                JsonValue::Array(items.iter().map(|v| self.render_args(v)).collect())
            }
            JsonValue::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_args(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Sums token usage across all recorded AI responses.
    #[must_use]
    pub fn total_token_usage(&self) -> TokenUsage {
        self.outputs
            .values()
            .filter_map(|output| match output {
                NodeOutput::AiResponse { usage, .. } => Some(*usage),
                _ => None,
            })
            .fold(TokenUsage::default(), TokenUsage::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_conversation::MemoryEntry;
    use serde_json::json;

    fn context_with_output(node_id: NodeId, output: NodeOutput) -> ExecutionContext {
        let memory = MemoryView::new(vec![MemoryEntry::new(
            "identity",
            "owner_email",
            json!("ada@example.com"),
        )]);
        let mut ctx = ExecutionContext::new(ConversationWindow::new(), memory, "book a meeting");
        ctx.record_output(node_id, output);
        ctx
    }

    #[test]
    fn resolve_user_message() {
        let ctx = ExecutionContext::new(
            ConversationWindow::new(),
            MemoryView::empty(),
            "hello there",
        );
        assert_eq!(ctx.resolve_path("user_message"), Some(json!("hello there")));
    }

    #[test]
    fn resolve_memory_key() {
        let ctx = context_with_output(
            NodeId::new(),
            NodeOutput::TriggerResult { payload: json!({}) },
        );
        assert_eq!(
            ctx.resolve_path("memory:owner_email"),
            Some(json!("ada@example.com"))
        );
        assert_eq!(ctx.resolve_path("memory:missing"), None);
    }

    #[test]
    fn resolve_node_output_with_json_path() {
        let node_id = NodeId::new();
        let ctx = context_with_output(
            node_id,
            NodeOutput::ActionResult {
                success: true,
                data: Some(json!({ "event": { "id": "ev-1" } })),
                error: None,
            },
        );
        assert_eq!(
            ctx.resolve_path(&format!("node:{node_id}.event.id")),
            Some(json!("ev-1"))
        );
        assert_eq!(ctx.resolve_path(&format!("node:{node_id}.missing")), None);
    }

    #[test]
    fn render_template_substitutes_known_references() {
        let node_id = NodeId::new();
        let ctx = context_with_output(
            node_id,
            NodeOutput::AiResponse {
                content: "Thursday at 2pm works.".to_string(),
                usage: TokenUsage::default(),
            },
        );

        let rendered = ctx.render_template(&format!(
            "To: {{{{memory:owner_email}}}}\nRe: {{{{user_message}}}}\n\n{{{{node:{node_id}}}}}"
        ));
        assert!(rendered.contains("ada@example.com"));
        assert!(rendered.contains("book a meeting"));
        assert!(rendered.contains("Thursday at 2pm works."));
    }

    #[test]
    fn render_template_leaves_unresolved_in_place() {
        let ctx = ExecutionContext::new(ConversationWindow::new(), MemoryView::empty(), "hi");
        let rendered = ctx.render_template("Dear {{name}}, hello");
        assert_eq!(rendered, "Dear {{name}}, hello");
    }

    #[test]
    fn render_args_renders_nested_strings() {
        let node_id = NodeId::new();
        let ctx = context_with_output(
            node_id,
            NodeOutput::AiResponse {
                content: "drafted body".to_string(),
                usage: TokenUsage::default(),
            },
        );
        let args = ctx.render_args(&json!({
            "recipient": "{{memory:owner_email}}",
            "body": format!("{{{{node:{node_id}}}}}"),
            "flags": ["{{user_message}}", 3],
        }));
        assert_eq!(args["recipient"], json!("ada@example.com"));
        assert_eq!(args["body"], json!("drafted body"));
        assert_eq!(args["flags"][0], json!("book a meeting"));
        assert_eq!(args["flags"][1], json!(3));
    }

    #[test]
    fn token_usage_is_summed_across_ai_outputs() {
        let mut ctx = ExecutionContext::default();
        ctx.record_output(
            NodeId::new(),
            NodeOutput::AiResponse {
                content: "a".to_string(),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            },
        );
        ctx.record_output(
            NodeId::new(),
            NodeOutput::AiResponse {
                content: "b".to_string(),
                usage: TokenUsage {
                    input_tokens: 7,
                    output_tokens: 3,
                },
            },
        );
        let total = ctx.total_token_usage();
        assert_eq!(total.input_tokens, 17);
        assert_eq!(total.output_tokens, 8);
    }
}
