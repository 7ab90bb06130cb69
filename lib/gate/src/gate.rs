//! The three-tier evaluation pipeline.
//!
//! Tiers run strictly in order and each can short-circuit:
//! schema validation, then L1 assertions, then the L2 score, then the
//! optional L3 judge. Verdict precedence: a hard block from schema or L1
//! wins outright; otherwise the judge (when triggered) or the L2 score
//! decides between auto-proceed and requires-approval.

use crate::assertions::{Assertion, Severity, default_assertions, run_assertion};
use crate::judge::{Judge, JudgePolicy};
use crate::registry::ActionRegistry;
use crate::scoring::{ScoreWeights, score_content};
use crate::verdict::EvalVerdict;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

/// Gate configuration shared across a run.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// L1 assertion list; empty means the default set.
    pub assertions: Vec<Assertion>,
    /// L2 dimension weights.
    pub weights: ScoreWeights,
    /// L2 scores below this set requires-approval.
    pub min_score: u8,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            assertions: default_assertions(),
            weights: ScoreWeights::default(),
            min_score: 70,
        }
    }
}

/// What the gate evaluates: one action invocation with its rendered
/// arguments and the user message that triggered the run.
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub action_type: &'a str,
    pub args: &'a JsonValue,
    pub user_message: &'a str,
}

/// The evaluation gate.
pub struct EvaluationGate {
    registry: ActionRegistry,
    config: GateConfig,
    judge: Option<Judge>,
}

impl EvaluationGate {
    #[must_use]
    pub fn new(registry: ActionRegistry, config: GateConfig) -> Self {
        Self {
            registry,
            config,
            judge: None,
        }
    }

    /// Attaches an L3 judge.
    #[must_use]
    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Returns true if the gate applies to this action type at all.
    #[must_use]
    pub fn applies_to(&self, action_type: &str) -> bool {
        self.registry.is_side_effecting(action_type)
    }

    /// Runs the full pipeline and returns the verdict.
    ///
    /// Read-only action types skip every tier and auto-proceed.
    pub async fn evaluate(&self, input: GateInput<'_>) -> EvalVerdict {
        if !self.applies_to(input.action_type) {
            debug!(action_type = input.action_type, "read-only action, gate skipped");
            return EvalVerdict::auto_proceed();
        }

        let mut verdict = EvalVerdict::auto_proceed();
        let spec = self.registry.get(input.action_type);

        // Schema validation. Failure never reaches later tiers.
        if let Some(reason) = self.validate_schema(&input, spec) {
            verdict.schema_valid = false;
            verdict.l1_passed = false;
            verdict.l2_score = 0;
            verdict.block_reason = Some(reason);
            info!(
                action_type = input.action_type,
                reason = verdict.block_reason.as_deref(),
                "gate blocked at schema tier"
            );
            return verdict;
        }

        let required_fields = self.required_field_text(&input, spec);
        let text = flatten_args(input.args);

        // L1 assertions. A block-severity failure wins outright.
        for assertion in &self.config.assertions {
            if let Some(failure) = run_assertion(assertion, &text, &required_fields) {
                if failure.severity == Severity::Block && verdict.block_reason.is_none() {
                    verdict.block_reason = Some(failure.detail.clone());
                    verdict
                        .suggestions
                        .push(format!("fix: {}", failure.detail));
                }
                verdict.l1_failures.push(failure);
            }
        }
        verdict.l1_passed = verdict
            .l1_failures
            .iter()
            .all(|f| f.severity != Severity::Block);
        if verdict.is_blocked() {
            verdict.l2_score = 0;
            info!(
                action_type = input.action_type,
                reason = verdict.block_reason.as_deref(),
                "gate blocked at L1"
            );
            return verdict;
        }

        // L2 rule-based score.
        let breakdown = score_content(
            &text,
            input.user_message,
            &required_fields,
            &self.config.weights,
        );
        verdict.l2_score = breakdown.total;
        for dimension in &breakdown.dimensions {
            if let Some(note) = &dimension.note {
                verdict.suggestions.push(note.clone());
            }
        }
        verdict.l2_breakdown = breakdown.dimensions;
        let l2_below_threshold = verdict.l2_score < self.config.min_score;
        if l2_below_threshold {
            verdict.requires_approval = true;
        }

        // L3 judge escalation, only for irreversible actions.
        let irreversible = spec.is_some_and(|s| s.irreversible);
        if irreversible && self.should_judge(l2_below_threshold) {
            verdict.l3_triggered = true;
            match &self.judge {
                Some(judge) => {
                    match judge
                        .evaluate(input.action_type, &text, input.user_message)
                        .await
                    {
                        Ok(outcome) => {
                            verdict.l3_passed = Some(outcome.pass);
                            verdict.suggestions.extend(outcome.suggestions);
                            // The judge overrides the L2 decision in both
                            // directions.
                            verdict.requires_approval = !outcome.pass;
                            debug!(
                                action_type = input.action_type,
                                score = outcome.score,
                                pass = outcome.pass,
                                "judge outcome"
                            );
                        }
                        Err(err) => {
                            // Fail safe: an unavailable judge never lets an
                            // irreversible action through unattended.
                            info!(
                                action_type = input.action_type,
                                error = %err,
                                "judge unavailable, requiring approval"
                            );
                            verdict.l3_passed = None;
                            verdict.requires_approval = true;
                        }
                    }
                }
                None => {
                    verdict.l3_passed = None;
                    verdict.requires_approval = true;
                }
            }
        }

        info!(
            action_type = input.action_type,
            l2_score = verdict.l2_score,
            requires_approval = verdict.requires_approval,
            "gate verdict"
        );
        verdict
    }

    fn should_judge(&self, l2_below_threshold: bool) -> bool {
        let policy = self
            .judge
            .as_ref()
            .map_or(JudgePolicy::OnIrreversibleAction, |j| j.config().policy);
        match policy {
            JudgePolicy::Always | JudgePolicy::OnIrreversibleAction => true,
            JudgePolicy::OnL2Failure => l2_below_threshold,
        }
    }

    fn validate_schema(
        &self,
        input: &GateInput<'_>,
        spec: Option<&crate::registry::ActionSpec>,
    ) -> Option<String> {
        let Some(object) = input.args.as_object() else {
            return Some("arguments are not a JSON object".to_string());
        };
        let Some(spec) = spec else {
            // Unregistered side-effecting actions have no declared shape;
            // later tiers still apply.
            return None;
        };

        for field in &spec.args {
            match object.get(&field.name) {
                Some(value) => {
                    if !field.kind.matches(value) {
                        return Some(format!(
                            "field '{}' has wrong type, expected {:?}",
                            field.name, field.kind
                        ));
                    }
                }
                None if field.required => {
                    return Some(format!("missing required field '{}'", field.name));
                }
                None => {}
            }
        }
        None
    }

    fn required_field_text(
        &self,
        input: &GateInput<'_>,
        spec: Option<&crate::registry::ActionSpec>,
    ) -> Vec<(String, String)> {
        let Some(spec) = spec else {
            return Vec::new();
        };
        let Some(object) = input.args.as_object() else {
            return Vec::new();
        };
        spec.required_args()
            .map(|field| {
                let value = object
                    .get(&field.name)
                    .map(value_text)
                    .unwrap_or_default();
                (field.name.clone(), value)
            })
            .collect()
    }
}

/// Flattens a JSON argument object into text for the lexical tiers.
fn flatten_args(args: &JsonValue) -> String {
    match args {
        JsonValue::Object(map) => map
            .values()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => value_text(other),
    }
}

fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
