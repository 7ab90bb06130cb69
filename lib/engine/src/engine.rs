//! The flow traversal engine.
//!
//! The engine walks a [`FlowGraph`] from its entry nodes, executing each
//! node once every incoming edge is accounted for. Edge satisfaction is
//! event-driven: a completed node satisfies its selected outgoing edges,
//! and a target becomes ready when at least one incoming edge is freshly
//! satisfied and the rest are satisfied, dead, or come from skipped
//! nodes. Ready nodes execute in FIFO order, so a given graph and inputs
//! always replay the same schedule.
//!
//! Cycles are legal; every execution spends one unit of the step budget
//! and exhausting the budget finalizes the run as failed. A run always
//! finalizes in exactly one terminal state.

use crate::context::{ExecutionContext, NodeOutput};
use crate::error::{FlowError, GraphInputError};
use crate::event::{EventKind, EventRecorder, EventSink};
use crate::executor::{ExecOutcome, NodeExecutor, NodeFailure};
use crate::graph::FlowGraph;
use crate::node::{NodeConfig, NodeId};
use crate::resume::{ConfirmationDecision, RetrySeed, SeedPlan, classify_seed};
use crate::settings::EngineSettings;
use flowgate_ai::TokenUsage;
use flowgate_core::{ConfirmationId, RunId};
use flowgate_gate::EvalVerdict;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a run finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Traversal drained with no critical failure.
    Completed,
    /// A critical node failure, budget exhaustion, or bad input.
    Failed,
    /// Paused on a gated action; resolve the confirmation to continue.
    AwaitingConfirmation,
    /// Cancelled between node executions.
    Cancelled,
}

/// A gated action waiting on an external decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub id: ConfirmationId,
    pub run_id: RunId,
    pub node_id: NodeId,
    pub action_type: String,
    /// The rendered arguments the gate evaluated.
    pub args: JsonValue,
    pub verdict: EvalVerdict,
}

/// An action the gate hard-blocked. The adapter was never invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedAction {
    pub node_id: NodeId,
    pub action_type: String,
    pub args: JsonValue,
    pub verdict: EvalVerdict,
}

/// The terminal record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Outputs of every executed or replayed node.
    pub outputs: HashMap<NodeId, NodeOutput>,
    /// The failure that finalized the run, or the gate block when the
    /// run completed with a blocked action.
    pub error: Option<FlowError>,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub blocked_action: Option<BlockedAction>,
    /// Node executions spent, out of the step budget.
    pub steps: u32,
    /// Token usage summed across all AI responses in the run.
    pub token_usage: TokenUsage,
}

/// Executes flow graphs against live conversation context.
///
/// The engine owns no per-run state; each call to [`Engine::run`],
/// [`Engine::resume`], or [`Engine::resolve_confirmation`] is an
/// independent invocation with its own run id and event sequence.
pub struct Engine {
    executor: Arc<dyn NodeExecutor>,
    sink: Arc<dyn EventSink>,
    settings: EngineSettings,
}

impl Engine {
    #[must_use]
    pub fn new(executor: Arc<dyn NodeExecutor>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            executor,
            sink,
            settings: EngineSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs a graph from its entry nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphInputError`] if the graph is structurally invalid.
    /// Execution failures do not error; they finalize into the summary.
    pub async fn run(
        &self,
        graph: &FlowGraph,
        context: ExecutionContext,
        trigger_payload: JsonValue,
        cancel: CancellationToken,
    ) -> Result<RunSummary, GraphInputError> {
        graph.validate()?;
        let mut traversal = self.traversal(graph, context, trigger_payload, cancel);
        info!(run_id = %traversal.run_id, "starting flow run");
        for entry in graph.entry_nodes() {
            traversal.enqueue(entry.id);
        }
        Ok(traversal.run_loop().await)
    }

    /// Re-runs a graph from `seed.retry_from`, replaying seeded outputs
    /// for everything strictly upstream instead of re-executing it.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphInputError`] if the graph is invalid, the retry
    /// target is unknown, or an ancestor is neither seeded nor provably
    /// skipped.
    pub async fn resume(
        &self,
        graph: &FlowGraph,
        context: ExecutionContext,
        seed: RetrySeed,
        cancel: CancellationToken,
    ) -> Result<RunSummary, GraphInputError> {
        graph.validate()?;
        let plan = classify_seed(graph, &seed)?;
        let mut traversal = self.traversal(graph, context, JsonValue::Null, cancel);
        info!(
            run_id = %traversal.run_id,
            retry_from = %seed.retry_from,
            reused = plan.reused.len(),
            "resuming flow run"
        );
        traversal.apply_seed(&plan, &seed.previous_outputs).await;
        traversal.enqueue(seed.retry_from);
        Ok(traversal.run_loop().await)
    }

    /// Applies an external decision to a pending confirmation and
    /// continues the flow downstream.
    ///
    /// An approval executes the action directly, bypassing the gate
    /// exactly once; a rejection skips the node and everything that
    /// depends solely on it, and the run completes cleanly.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphInputError`] under the same conditions as
    /// [`Engine::resume`], or if the confirmation target is not an
    /// action node.
    pub async fn resolve_confirmation(
        &self,
        graph: &FlowGraph,
        context: ExecutionContext,
        pending: PendingConfirmation,
        decision: ConfirmationDecision,
        previous_outputs: HashMap<NodeId, NodeOutput>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, GraphInputError> {
        graph.validate()?;
        let node_id = pending.node_id;
        let node = graph
            .get_node(node_id)
            .ok_or(GraphInputError::RetryTargetNotFound { node_id })?;
        if !matches!(node.config, NodeConfig::Action { .. }) {
            return Err(GraphInputError::NotAnActionNode { node_id });
        }

        let seed = RetrySeed::new(node_id, previous_outputs);
        let plan = classify_seed(graph, &seed)?;
        let mut traversal = self.traversal(graph, context, JsonValue::Null, cancel);
        info!(
            run_id = %traversal.run_id,
            confirmation = %pending.id,
            node_id = %node_id,
            "resolving confirmation"
        );
        traversal.apply_seed(&plan, &seed.previous_outputs).await;

        match decision {
            ConfirmationDecision::Rejected => {
                traversal
                    .skip_node(node_id, "confirmation rejected".to_string())
                    .await;
                traversal.propagate_skips().await;
            }
            ConfirmationDecision::Approved | ConfirmationDecision::ApprovedWithEdits { .. } => {
                let args = match decision {
                    ConfirmationDecision::ApprovedWithEdits { args } => args,
                    _ => pending.args,
                };
                traversal.steps_used += 1;
                traversal.recorder.emit(EventKind::NodeStart { node_id }).await;
                match traversal.executor.execute_approved(node, args).await {
                    Ok(output) => traversal.complete_node(node_id, output).await,
                    Err(failure) => traversal.fail_node(node_id, failure).await,
                }
            }
        }
        Ok(traversal.run_loop().await)
    }

    fn traversal<'a>(
        &'a self,
        graph: &'a FlowGraph,
        context: ExecutionContext,
        trigger_payload: JsonValue,
        cancel: CancellationToken,
    ) -> Traversal<'a> {
        let run_id = RunId::new();
        Traversal {
            graph,
            executor: self.executor.as_ref(),
            settings: &self.settings,
            recorder: EventRecorder::new(run_id, Arc::clone(&self.sink)),
            run_id,
            context,
            trigger_payload,
            cancel,
            fresh: HashSet::new(),
            satisfied: HashSet::new(),
            dead: HashSet::new(),
            skipped: HashSet::new(),
            ready: VecDeque::new(),
            queued: HashSet::new(),
            failure: None,
            steps_used: 0,
        }
    }
}

/// Mutable state of one run.
struct Traversal<'a> {
    graph: &'a FlowGraph,
    executor: &'a dyn NodeExecutor,
    settings: &'a EngineSettings,
    recorder: EventRecorder,
    run_id: RunId,
    context: ExecutionContext,
    trigger_payload: JsonValue,
    cancel: CancellationToken,
    /// Edges satisfied since their target last executed.
    fresh: HashSet<crate::edge::EdgeId>,
    /// Edges satisfied at least once in this run.
    satisfied: HashSet<crate::edge::EdgeId>,
    /// Unselected branch handles.
    dead: HashSet<crate::edge::EdgeId>,
    skipped: HashSet<NodeId>,
    ready: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
    /// First critical failure; finalizes the run once traversal drains.
    failure: Option<FlowError>,
    steps_used: u32,
}

impl Traversal<'_> {
    fn enqueue(&mut self, node_id: NodeId) {
        if self.queued.insert(node_id) {
            self.ready.push_back(node_id);
        }
    }

    /// Replays a seed plan: reused outputs are recorded and their edges
    /// satisfied, proven-skipped ancestors are marked skipped.
    async fn apply_seed(&mut self, plan: &SeedPlan, outputs: &HashMap<NodeId, NodeOutput>) {
        for &node_id in &plan.reused {
            if let Some(output) = outputs.get(&node_id) {
                self.context.record_output(node_id, output.clone());
            }
            self.recorder.emit(EventKind::NodeReused { node_id }).await;
        }
        for &edge_id in &plan.satisfied_edges {
            self.satisfied.insert(edge_id);
        }
        self.dead.extend(plan.dead_edges.iter().copied());
        for &node_id in &plan.skipped {
            self.skip_node(node_id, "branch not selected".to_string()).await;
        }
    }

    async fn run_loop(mut self) -> RunSummary {
        while let Some(node_id) = self.ready.pop_front() {
            self.queued.remove(&node_id);

            if self.cancel.is_cancelled() {
                self.recorder
                    .emit(EventKind::FlowError {
                        error: FlowError::Cancelled,
                    })
                    .await;
                return self.finalize(RunStatus::Cancelled, Some(FlowError::Cancelled), None, None);
            }
            if self.steps_used >= self.settings.step_budget {
                let error = FlowError::BudgetExceeded {
                    budget: self.settings.step_budget,
                };
                self.recorder
                    .emit(EventKind::FlowError {
                        error: error.clone(),
                    })
                    .await;
                return self.finalize(RunStatus::Failed, Some(error), None, None);
            }
            self.steps_used += 1;

            // A fresh satisfaction is spent by the execution it triggers,
            // so a cycle re-runs a node only when new input arrives.
            for edge in self.graph.incoming_edges(node_id) {
                self.fresh.remove(&edge.id);
            }

            let Some(node) = self.graph.get_node(node_id) else {
                continue;
            };
            debug!(run_id = %self.run_id, node_id = %node_id, name = %node.name, "executing node");
            self.recorder.emit(EventKind::NodeStart { node_id }).await;

            match self
                .executor
                .execute(node, &self.context, &self.trigger_payload)
                .await
            {
                Ok(ExecOutcome::Output(output)) => self.complete_node(node_id, output).await,
                Ok(ExecOutcome::Blocked {
                    action_type,
                    args,
                    verdict,
                }) => {
                    let reason = verdict
                        .block_reason
                        .clone()
                        .unwrap_or_else(|| "content failed hard assertions".to_string());
                    self.recorder
                        .emit(EventKind::ActionBlocked {
                            node_id,
                            action_type: action_type.clone(),
                            verdict: verdict.clone(),
                        })
                        .await;
                    self.recorder.emit(EventKind::FlowComplete).await;
                    let blocked = BlockedAction {
                        node_id,
                        action_type,
                        args,
                        verdict,
                    };
                    return self.finalize(
                        RunStatus::Completed,
                        Some(FlowError::GateBlock { node_id, reason }),
                        None,
                        Some(blocked),
                    );
                }
                Ok(ExecOutcome::AwaitingConfirmation {
                    action_type,
                    args,
                    verdict,
                }) => {
                    self.recorder
                        .emit(EventKind::AwaitingConfirmation {
                            node_id,
                            action_type: action_type.clone(),
                            args: args.clone(),
                            verdict: verdict.clone(),
                        })
                        .await;
                    self.recorder.emit(EventKind::FlowComplete).await;
                    let pending = PendingConfirmation {
                        id: ConfirmationId::new(),
                        run_id: self.run_id,
                        node_id,
                        action_type,
                        args,
                        verdict,
                    };
                    return self.finalize(
                        RunStatus::AwaitingConfirmation,
                        None,
                        Some(pending),
                        None,
                    );
                }
                Err(failure) => self.fail_node(node_id, failure).await,
            }
        }

        if let Some(error) = self.failure.take() {
            self.recorder
                .emit(EventKind::FlowError {
                    error: error.clone(),
                })
                .await;
            return self.finalize(RunStatus::Failed, Some(error), None, None);
        }
        self.recorder.emit(EventKind::FlowComplete).await;
        self.finalize(RunStatus::Completed, None, None, None)
    }

    async fn complete_node(&mut self, node_id: NodeId, output: NodeOutput) {
        self.context.record_output(node_id, output.clone());
        self.recorder
            .emit(EventKind::NodeComplete {
                node_id,
                output: output.clone(),
            })
            .await;
        self.cascade(node_id, &output).await;
    }

    async fn fail_node(&mut self, node_id: NodeId, failure: NodeFailure) {
        self.recorder
            .emit(EventKind::NodeError {
                node_id,
                error: failure.message.clone(),
                retryable: failure.retryable,
            })
            .await;

        let non_critical = matches!(
            self.graph.get_node(node_id).map(|n| &n.config),
            Some(NodeConfig::Action {
                non_critical: true,
                ..
            })
        );
        if non_critical {
            // Downstream nodes see the failure as data and keep going.
            let output = NodeOutput::ActionResult {
                success: false,
                data: None,
                error: Some(failure.message),
            };
            self.context.record_output(node_id, output.clone());
            self.cascade(node_id, &output).await;
        } else if self.failure.is_none() {
            // Outgoing edges stay unsatisfied, so dependents never run.
            self.failure = Some(FlowError::NodeExecution {
                node_id,
                message: failure.message,
                retryable: failure.retryable,
            });
        }
    }

    /// Satisfies the outgoing edges selected by `output` and marks
    /// unselected branch handles dead, then re-examines affected targets.
    async fn cascade(&mut self, node_id: NodeId, output: &NodeOutput) {
        let mut satisfied_targets = Vec::new();
        for edge in self.graph.outgoing_edges(node_id) {
            let selected = match output {
                NodeOutput::BranchResult { selected_handle } => {
                    edge.matches_handle(selected_handle)
                }
                _ => true,
            };
            if selected {
                satisfied_targets.push((edge.id, edge.target));
            } else {
                self.dead.insert(edge.id);
            }
        }
        for &(edge_id, _) in &satisfied_targets {
            self.fresh.insert(edge_id);
            self.satisfied.insert(edge_id);
        }
        self.propagate_skips().await;
        for (_, target) in satisfied_targets {
            self.reconsider(target);
        }
    }

    async fn skip_node(&mut self, node_id: NodeId, reason: String) {
        if self.skipped.insert(node_id) {
            self.recorder
                .emit(EventKind::NodeSkipped { node_id, reason })
                .await;
        }
    }

    /// Marks every node whose incoming edges are all dead or come from
    /// skipped nodes, to a fixpoint, then re-examines joins the skips
    /// may have unblocked.
    async fn propagate_skips(&mut self) {
        let mut newly_skipped = Vec::new();
        loop {
            let mut round = Vec::new();
            for node in self.graph.nodes() {
                let node_id = node.id;
                if self.skipped.contains(&node_id)
                    || self.queued.contains(&node_id)
                    || self.context.output(node_id).is_some()
                {
                    continue;
                }
                let incoming = self.graph.incoming_edges(node_id);
                if incoming.is_empty() {
                    continue;
                }
                let all_dead = incoming
                    .iter()
                    .all(|e| self.dead.contains(&e.id) || self.skipped.contains(&e.source));
                if all_dead {
                    let reason = if incoming.iter().any(|e| self.dead.contains(&e.id)) {
                        "branch not selected"
                    } else {
                        "upstream skipped"
                    };
                    round.push((node_id, reason.to_string()));
                }
            }
            if round.is_empty() {
                break;
            }
            for (node_id, reason) in round {
                self.skip_node(node_id, reason).await;
                newly_skipped.push(node_id);
            }
        }
        for node_id in newly_skipped {
            let targets: Vec<NodeId> = self
                .graph
                .outgoing_edges(node_id)
                .iter()
                .map(|e| e.target)
                .collect();
            for target in targets {
                self.reconsider(target);
            }
        }
    }

    /// Enqueues `target` if it has a fresh incoming satisfaction and
    /// every other incoming edge is accounted for.
    fn reconsider(&mut self, target: NodeId) {
        if self.queued.contains(&target) || self.skipped.contains(&target) {
            return;
        }
        let incoming = self.graph.incoming_edges(target);
        if !incoming.iter().any(|e| self.fresh.contains(&e.id)) {
            return;
        }
        let all_accounted = incoming.iter().all(|e| {
            self.fresh.contains(&e.id)
                || self.satisfied.contains(&e.id)
                || self.dead.contains(&e.id)
                || self.skipped.contains(&e.source)
        });
        if all_accounted {
            self.enqueue(target);
        }
    }

    fn finalize(
        self,
        status: RunStatus,
        error: Option<FlowError>,
        pending_confirmation: Option<PendingConfirmation>,
        blocked_action: Option<BlockedAction>,
    ) -> RunSummary {
        info!(run_id = %self.run_id, ?status, steps = self.steps_used, "run finalized");
        RunSummary {
            run_id: self.run_id,
            status,
            token_usage: self.context.total_token_usage(),
            outputs: self.context.outputs,
            error,
            pending_confirmation,
            blocked_action,
            steps: self.steps_used,
        }
    }
}
