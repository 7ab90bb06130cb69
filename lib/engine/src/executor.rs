//! Node executors.
//!
//! One execution arm per node kind, behind the [`NodeExecutor`] seam so
//! the traversal engine can be driven by test doubles. The standard
//! executor wires the provider registry, the adapter registry, and the
//! evaluation gate together.

use crate::context::{ExecutionContext, NodeOutput};
use crate::node::{Node, NodeConfig};
use async_trait::async_trait;
use flowgate_ai::{LlmMessage, LlmRequest, MessageRole, ProviderRegistry};
use flowgate_conversation::TurnRole;
use flowgate_gate::{EvalVerdict, EvaluationGate, GateInput};
use flowgate_integration::AdapterRegistry;
use serde_json::Value as JsonValue;
use tracing::debug;

/// A node executor failure with its retryability classification.
///
/// The engine never retries on its own; retryable failures are surfaced
/// to the caller, who may resume with a seed pointing at the failed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub message: String,
    pub retryable: bool,
}

impl NodeFailure {
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NodeFailure {}

/// What executing a node produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// The node produced an output; traversal continues.
    Output(NodeOutput),
    /// The gate hard-blocked the action; the adapter was never invoked.
    Blocked {
        action_type: String,
        args: JsonValue,
        verdict: EvalVerdict,
    },
    /// The gate requires human approval; the adapter was never invoked.
    AwaitingConfirmation {
        action_type: String,
        args: JsonValue,
        verdict: EvalVerdict,
    },
}

/// Executes individual flow nodes.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Executes a node against the accumulated context.
    ///
    /// `trigger_payload` is the run invocation's payload, consumed by
    /// trigger nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`NodeFailure`] when the node cannot produce an outcome.
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        trigger_payload: &JsonValue,
    ) -> Result<ExecOutcome, NodeFailure>;

    /// Executes an approved action node directly with the given arguments,
    /// bypassing the gate. The approval itself is the authorization; this
    /// path is taken exactly once per confirmation.
    ///
    /// # Errors
    ///
    /// Returns a [`NodeFailure`] when the adapter call fails or the node
    /// is not an action node.
    async fn execute_approved(
        &self,
        node: &Node,
        args: JsonValue,
    ) -> Result<NodeOutput, NodeFailure>;
}

/// The production executor.
pub struct StandardExecutor {
    providers: ProviderRegistry,
    adapters: AdapterRegistry,
    gate: EvaluationGate,
}

impl StandardExecutor {
    #[must_use]
    pub fn new(providers: ProviderRegistry, adapters: AdapterRegistry, gate: EvaluationGate) -> Self {
        Self {
            providers,
            adapters,
            gate,
        }
    }

    async fn run_llm_step(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ExecOutcome, NodeFailure> {
        let NodeConfig::LlmStep {
            family,
            system_instructions,
            temperature,
            max_tokens,
        } = &node.config
        else {
            unreachable!("dispatched on node kind");
        };

        let backend = self.providers.resolve(*family).map_err(|err| NodeFailure {
            retryable: err.retryable(),
            message: err.to_string(),
        })?;

        let history: Vec<LlmMessage> = ctx
            .conversation
            .turns()
            .iter()
            .map(|turn| LlmMessage {
                role: match turn.role {
                    TurnRole::User => MessageRole::User,
                    TurnRole::Agent => MessageRole::Assistant,
                    TurnRole::System => MessageRole::System,
                },
                content: turn.content.clone(),
            })
            .collect();

        let mut request = LlmRequest::new(ctx.user_message.clone())
            .with_system(system_instructions.clone())
            .with_context(history);
        if let Some(temperature) = temperature {
            request = request.with_temperature(*temperature);
        }
        if let Some(max_tokens) = max_tokens {
            request = request.with_max_tokens(*max_tokens);
        }

        let response = backend.generate(&request).await.map_err(|err| NodeFailure {
            retryable: err.retryable(),
            message: err.to_string(),
        })?;

        Ok(ExecOutcome::Output(NodeOutput::AiResponse {
            content: response.content,
            usage: response.usage,
        }))
    }

    async fn run_action(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ExecOutcome, NodeFailure> {
        let NodeConfig::Action {
            action_type,
            args_template,
            ..
        } = &node.config
        else {
            unreachable!("dispatched on node kind");
        };

        let args = ctx.render_args(args_template);
        let verdict = self
            .gate
            .evaluate(GateInput {
                action_type,
                args: &args,
                user_message: &ctx.user_message,
            })
            .await;

        if verdict.is_blocked() {
            debug!(node_id = %node.id, action_type, "action blocked by gate");
            return Ok(ExecOutcome::Blocked {
                action_type: action_type.clone(),
                args,
                verdict,
            });
        }
        if !verdict.may_auto_proceed() {
            debug!(node_id = %node.id, action_type, "action awaiting confirmation");
            return Ok(ExecOutcome::AwaitingConfirmation {
                action_type: action_type.clone(),
                args,
                verdict,
            });
        }

        let output = self.invoke_adapter(action_type, args).await?;
        Ok(ExecOutcome::Output(output))
    }

    async fn invoke_adapter(
        &self,
        action_type: &str,
        args: JsonValue,
    ) -> Result<NodeOutput, NodeFailure> {
        let adapter = self.adapters.resolve(action_type).map_err(|err| NodeFailure {
            retryable: err.retryable(),
            message: err.to_string(),
        })?;
        let data = adapter.execute(args).await.map_err(|err| NodeFailure {
            retryable: err.retryable(),
            message: err.to_string(),
        })?;
        Ok(NodeOutput::ActionResult {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn run_branch(node: &Node, ctx: &ExecutionContext) -> ExecOutcome {
        let NodeConfig::Branch {
            rules,
            fallback_handle,
        } = &node.config
        else {
            unreachable!("dispatched on node kind");
        };

        let selected = rules
            .iter()
            .find(|rule| {
                let resolved = ctx.resolve_path(&rule.predicate.path);
                rule.predicate.evaluate(resolved.as_ref())
            })
            .map_or_else(|| fallback_handle.clone(), |rule| rule.handle.clone());

        ExecOutcome::Output(NodeOutput::BranchResult {
            selected_handle: selected,
        })
    }
}

#[async_trait]
impl NodeExecutor for StandardExecutor {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        trigger_payload: &JsonValue,
    ) -> Result<ExecOutcome, NodeFailure> {
        match &node.config {
            NodeConfig::Trigger => Ok(ExecOutcome::Output(NodeOutput::TriggerResult {
                payload: trigger_payload.clone(),
            })),
            NodeConfig::LlmStep { .. } => self.run_llm_step(node, ctx).await,
            NodeConfig::Action { .. } => self.run_action(node, ctx).await,
            NodeConfig::Branch { .. } => Ok(Self::run_branch(node, ctx)),
        }
    }

    async fn execute_approved(
        &self,
        node: &Node,
        args: JsonValue,
    ) -> Result<NodeOutput, NodeFailure> {
        let NodeConfig::Action { action_type, .. } = &node.config else {
            return Err(NodeFailure::permanent(format!(
                "node {} is not an action node",
                node.id
            )));
        };
        self.invoke_adapter(action_type, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BranchRule, Predicate, PredicateOp};
    use flowgate_ai::{LlmBackend, LlmError, LlmResponse, ModelFamily, TokenUsage};
    use flowgate_conversation::{ConversationWindow, MemoryView, Turn};
    use flowgate_gate::{ActionRegistry, GateConfig};
    use flowgate_integration::{ActionAdapter, AdapterError};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedBackend(Result<String, LlmError>);

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.0.clone().map(|content| LlmResponse {
                content,
                structured_output: None,
                usage: TokenUsage {
                    input_tokens: 12,
                    output_tokens: 4,
                },
                model: "canned".to_string(),
            })
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    struct CountingAdapter {
        action_type: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionAdapter for CountingAdapter {
        async fn execute(&self, args: JsonValue) -> Result<JsonValue, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": args }))
        }

        fn action_type(&self) -> &str {
            &self.action_type
        }
    }

    fn executor_with(
        backend: Option<Arc<dyn LlmBackend>>,
        adapter_calls: &Arc<AtomicUsize>,
    ) -> StandardExecutor {
        let mut providers = ProviderRegistry::new();
        if let Some(backend) = backend {
            providers.register(ModelFamily::Local, backend);
        }
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(CountingAdapter {
            action_type: "append_document".to_string(),
            calls: Arc::clone(adapter_calls),
        }));
        adapters.register(Arc::new(CountingAdapter {
            action_type: "send_message".to_string(),
            calls: Arc::clone(adapter_calls),
        }));
        let gate = EvaluationGate::new(ActionRegistry::with_builtins(), GateConfig::default());
        StandardExecutor::new(providers, adapters, gate)
    }

    fn ctx(user_message: &str) -> ExecutionContext {
        ExecutionContext::new(ConversationWindow::new(), MemoryView::empty(), user_message)
    }

    #[tokio::test]
    async fn trigger_returns_invocation_payload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new("Entry", NodeConfig::Trigger);

        let outcome = executor
            .execute(&node, &ctx("hi"), &json!({ "source": "chat" }))
            .await
            .expect("trigger executes");
        assert_eq!(
            outcome,
            ExecOutcome::Output(NodeOutput::TriggerResult {
                payload: json!({ "source": "chat" })
            })
        );
    }

    #[tokio::test]
    async fn llm_step_sends_window_and_returns_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(
            Some(Arc::new(CannedBackend(Ok("drafted reply".to_string())))),
            &calls,
        );
        let node = Node::new(
            "Draft",
            NodeConfig::LlmStep {
                family: ModelFamily::Local,
                system_instructions: "be brief".to_string(),
                temperature: Some(0.2),
                max_tokens: None,
            },
        );
        let mut context = ctx("draft a reply");
        context.conversation.push(Turn::user("earlier question"));

        let outcome = executor
            .execute(&node, &context, &JsonValue::Null)
            .await
            .expect("llm step executes");
        match outcome {
            ExecOutcome::Output(NodeOutput::AiResponse { content, usage }) => {
                assert_eq!(content, "drafted reply");
                assert_eq!(usage.total(), 16);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn llm_failure_preserves_retryability() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(Some(Arc::new(CannedBackend(Err(LlmError::Timeout)))), &calls);
        let node = Node::new(
            "Draft",
            NodeConfig::LlmStep {
                family: ModelFamily::Local,
                system_instructions: String::new(),
                temperature: None,
                max_tokens: None,
            },
        );

        let failure = executor
            .execute(&node, &ctx("hi"), &JsonValue::Null)
            .await
            .expect_err("should fail");
        assert!(failure.retryable);
    }

    #[tokio::test]
    async fn unregistered_model_family_is_a_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Draft",
            NodeConfig::LlmStep {
                family: ModelFamily::Claude,
                system_instructions: String::new(),
                temperature: None,
                max_tokens: None,
            },
        );

        let failure = executor
            .execute(&node, &ctx("hi"), &JsonValue::Null)
            .await
            .expect_err("should fail");
        assert!(!failure.retryable);
    }

    #[tokio::test]
    async fn action_with_good_content_invokes_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Append",
            NodeConfig::Action {
                action_type: "append_document".to_string(),
                args_template: json!({
                    "document_id": "doc-1",
                    "content": "Summary of the quarterly budget discussion: spending is on \
                                track and vendor contracts get revisited next month."
                }),
                non_critical: false,
            },
        );

        let outcome = executor
            .execute(
                &node,
                &ctx("summarize the quarterly budget discussion"),
                &JsonValue::Null,
            )
            .await
            .expect("action executes");
        assert!(matches!(
            outcome,
            ExecOutcome::Output(NodeOutput::ActionResult { success: true, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocked_action_never_reaches_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Send",
            NodeConfig::Action {
                action_type: "send_message".to_string(),
                args_template: json!({
                    "recipient": "sam@example.com",
                    "body": "Dear {{name}}, your meeting is confirmed."
                }),
                non_critical: false,
            },
        );

        let outcome = executor
            .execute(&node, &ctx("confirm the meeting"), &JsonValue::Null)
            .await
            .expect("gate evaluates");
        assert!(matches!(outcome, ExecOutcome::Blocked { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn approved_execution_bypasses_gate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Send",
            NodeConfig::Action {
                action_type: "send_message".to_string(),
                args_template: json!({}),
                non_critical: false,
            },
        );

        // Args that the gate would block outright still execute once the
        // caller has approved them.
        let output = executor
            .execute_approved(
                &node,
                json!({ "recipient": "sam@example.com", "body": "Dear {{name}}" }),
            )
            .await
            .expect("approved action executes");
        assert!(matches!(output, NodeOutput::ActionResult { success: true, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn branch_selects_first_matching_rule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Route",
            NodeConfig::Branch {
                rules: vec![
                    BranchRule {
                        handle: "meeting".to_string(),
                        predicate: Predicate::new(
                            "user_message",
                            PredicateOp::Contains,
                            json!("meeting"),
                        ),
                    },
                    BranchRule {
                        handle: "anything".to_string(),
                        predicate: Predicate::new("user_message", PredicateOp::Ne, json!("")),
                    },
                ],
                fallback_handle: "other".to_string(),
            },
        );

        let outcome = executor
            .execute(&node, &ctx("schedule a meeting"), &JsonValue::Null)
            .await
            .expect("branch executes");
        assert_eq!(
            outcome,
            ExecOutcome::Output(NodeOutput::BranchResult {
                selected_handle: "meeting".to_string()
            })
        );
    }

    #[tokio::test]
    async fn branch_falls_back_when_no_rule_matches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(None, &calls);
        let node = Node::new(
            "Route",
            NodeConfig::Branch {
                rules: vec![BranchRule {
                    handle: "meeting".to_string(),
                    predicate: Predicate::new(
                        "user_message",
                        PredicateOp::Contains,
                        json!("meeting"),
                    ),
                }],
                fallback_handle: "other".to_string(),
            },
        );

        let outcome = executor
            .execute(&node, &ctx("what's the weather"), &JsonValue::Null)
            .await
            .expect("branch executes");
        assert_eq!(
            outcome,
            ExecOutcome::Output(NodeOutput::BranchResult {
                selected_handle: "other".to_string()
            })
        );
    }
}
