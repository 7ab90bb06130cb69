//! L3 judge escalation.
//!
//! An independent language model scores the candidate content against the
//! same context the producing model saw. The judge is fail-safe: a timeout,
//! provider error, or unparseable response downgrades the outcome to
//! requires-approval rather than letting the action through.

use crate::error::GateError;
use flowgate_ai::{LlmBackend, LlmRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// When the judge tier is invoked for an irreversible action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgePolicy {
    /// Judge every gated action.
    Always,
    /// Judge only when the L2 score fell below its threshold.
    OnL2Failure,
    /// Judge every irreversible action regardless of L2.
    #[default]
    OnIrreversibleAction,
}

/// Judge tier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub policy: JudgePolicy,
    /// Judge scores at or above this auto-proceed without approval.
    pub auto_proceed_threshold: u8,
    /// Wall-clock budget for the judge call.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            policy: JudgePolicy::default(),
            auto_proceed_threshold: 85,
            timeout: Duration::from_secs(15),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// The judge's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeOutcome {
    /// Confidence score, 0-100.
    pub score: u8,
    /// True when the score clears the auto-proceed threshold.
    pub pass: bool,
    pub reason: String,
    pub suggestions: Vec<String>,
}

/// The structured shape the judge model is asked to return.
#[derive(Debug, Deserialize)]
struct JudgeResponse {
    score: u8,
    reason: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict quality reviewer for outbound actions taken \
on a user's behalf. Score the candidate content from 0 to 100 for whether it faithfully and \
safely carries out the user's request. Respond with JSON: \
{\"score\": <0-100>, \"reason\": \"...\", \"suggestions\": [\"...\"]}";

/// Wraps an LLM backend as an independent content judge.
pub struct Judge {
    backend: Arc<dyn LlmBackend>,
    config: JudgeConfig,
}

impl Judge {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, config: JudgeConfig) -> Self {
        Self { backend, config }
    }

    #[must_use]
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Judges the candidate content against the triggering user message.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::JudgeUnavailable`] when the call times out,
    /// the provider fails, or the response cannot be parsed. Callers must
    /// treat that error as requires-approval.
    pub async fn evaluate(
        &self,
        action_type: &str,
        content: &str,
        user_message: &str,
    ) -> Result<JudgeOutcome, GateError> {
        let prompt = format!(
            "Action type: {action_type}\n\nUser request:\n{user_message}\n\nCandidate content:\n{content}"
        );
        let request = LlmRequest::new(prompt)
            .with_system(JUDGE_SYSTEM_PROMPT)
            .with_output_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "score": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "reason": { "type": "string" },
                    "suggestions": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["score", "reason"]
            }))
            .with_temperature(0.0);

        let response = tokio::time::timeout(self.config.timeout, self.backend.generate(&request))
            .await
            .map_err(|_| {
                warn!(action_type, "judge call timed out");
                GateError::JudgeUnavailable {
                    reason: format!("timed out after {}s", self.config.timeout.as_secs()),
                }
            })?
            .map_err(|err| {
                warn!(action_type, error = %err, "judge call failed");
                GateError::JudgeUnavailable {
                    reason: err.to_string(),
                }
            })?;

        let parsed: JudgeResponse = match &response.structured_output {
            Some(value) => serde_json::from_value(value.clone()),
            None => serde_json::from_str(&response.content),
        }
        .map_err(|err| GateError::JudgeUnavailable {
            reason: format!("unparseable judge response: {err}"),
        })?;

        let score = parsed.score.min(100);
        Ok(JudgeOutcome {
            score,
            pass: score >= self.config.auto_proceed_threshold,
            reason: parsed.reason,
            suggestions: parsed.suggestions,
        })
    }
}
