//! Engine configuration.
//!
//! Settings are strongly typed and loadable from environment variables
//! via the `config` crate. Every field has a default so an empty
//! environment yields a working engine.

use flowgate_gate::{GateConfig, JudgeConfig, ScoreWeights};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the traversal engine and its gate.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Maximum node executions per run. Bounds cyclic graphs.
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,

    /// Minimum L2 score for an action to proceed without approval.
    #[serde(default = "default_l2_min_score")]
    pub l2_min_score: u8,

    /// Judge scores at or above this auto-proceed without approval.
    #[serde(default = "default_auto_proceed_threshold")]
    pub auto_proceed_threshold: u8,

    /// Wall-clock budget for a judge call, in seconds.
    #[serde(default = "default_judge_timeout_seconds")]
    pub judge_timeout_seconds: u64,

    /// Conversation window capacity in turns.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_step_budget() -> u32 {
    10
}

fn default_l2_min_score() -> u8 {
    70
}

fn default_auto_proceed_threshold() -> u8 {
    85
}

fn default_judge_timeout_seconds() -> u64 {
    15
}

fn default_window_size() -> usize {
    flowgate_conversation::message::DEFAULT_WINDOW_SIZE
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            l2_min_score: default_l2_min_score(),
            auto_proceed_threshold: default_auto_proceed_threshold(),
            judge_timeout_seconds: default_judge_timeout_seconds(),
            window_size: default_window_size(),
        }
    }
}

impl EngineSettings {
    /// Loads settings from `FLOWGATE_ENGINE`-prefixed environment
    /// variables (e.g. `FLOWGATE_ENGINE__STEP_BUDGET=25`).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLOWGATE_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Sets the step budget.
    #[must_use]
    pub fn with_step_budget(mut self, budget: u32) -> Self {
        self.step_budget = budget;
        self
    }

    /// Derives the gate configuration from these settings.
    #[must_use]
    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            min_score: self.l2_min_score,
            weights: ScoreWeights::default(),
            ..GateConfig::default()
        }
    }

    /// Creates an empty conversation window at the configured capacity.
    #[must_use]
    pub fn conversation_window(&self) -> flowgate_conversation::ConversationWindow {
        flowgate_conversation::ConversationWindow::with_capacity(self.window_size)
    }

    /// Derives the judge configuration from these settings.
    #[must_use]
    pub fn judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            auto_proceed_threshold: self.auto_proceed_threshold,
            timeout: Duration::from_secs(self.judge_timeout_seconds),
            ..JudgeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = EngineSettings::default();
        assert_eq!(settings.step_budget, 10);
        assert_eq!(settings.l2_min_score, 70);
        assert_eq!(settings.auto_proceed_threshold, 85);
        assert_eq!(settings.judge_timeout_seconds, 15);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = EngineSettings::from_env().expect("defaults apply");
        assert_eq!(settings.step_budget, EngineSettings::default().step_budget);
    }

    #[test]
    fn conversation_window_uses_configured_capacity() {
        let mut settings = EngineSettings::default();
        settings.window_size = 5;
        assert_eq!(settings.conversation_window().capacity(), 5);
    }

    #[test]
    fn derived_configs_carry_thresholds() {
        let settings = EngineSettings::default().with_step_budget(25);
        assert_eq!(settings.step_budget, 25);
        assert_eq!(settings.gate_config().min_score, 70);
        assert_eq!(settings.judge_config().auto_proceed_threshold, 85);
        assert_eq!(
            settings.judge_config().timeout,
            Duration::from_secs(15)
        );
    }
}
