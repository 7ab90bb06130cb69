//! The gate's evaluation verdict.
//!
//! A verdict is created fresh per side-effecting action invocation and
//! handed to the caller; the gate never persists it.

use crate::assertions::AssertionFailure;
use crate::scoring::DimensionScore;
use serde::{Deserialize, Serialize};

/// The outcome of running an action's arguments through the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalVerdict {
    /// Whether the arguments matched the declared schema.
    pub schema_valid: bool,
    /// Whether every L1 assertion passed (warnings count as passed).
    pub l1_passed: bool,
    /// Individual L1 failures, both blocking and warning.
    pub l1_failures: Vec<AssertionFailure>,
    /// The L2 rule-based score, 0-100.
    pub l2_score: u8,
    /// Per-dimension breakdown of the L2 score.
    pub l2_breakdown: Vec<DimensionScore>,
    /// Whether the L3 judge tier ran.
    pub l3_triggered: bool,
    /// The judge's pass/fail, if it ran and returned.
    pub l3_passed: Option<bool>,
    /// Human-readable reason when the verdict is a hard block.
    pub block_reason: Option<String>,
    /// Whether the action needs human approval before executing.
    pub requires_approval: bool,
    /// Improvement suggestions collected across tiers.
    pub suggestions: Vec<String>,
}

impl EvalVerdict {
    /// A verdict that allows automatic execution with nothing flagged.
    #[must_use]
    pub fn auto_proceed() -> Self {
        Self {
            schema_valid: true,
            l1_passed: true,
            l1_failures: Vec::new(),
            l2_score: 100,
            l2_breakdown: Vec::new(),
            l3_triggered: false,
            l3_passed: None,
            block_reason: None,
            requires_approval: false,
            suggestions: Vec::new(),
        }
    }

    /// Returns true if the action is hard-blocked and must not execute.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.block_reason.is_some()
    }

    /// Returns true if the action may execute without human approval.
    #[must_use]
    pub fn may_auto_proceed(&self) -> bool {
        !self.is_blocked() && !self.requires_approval
    }
}
