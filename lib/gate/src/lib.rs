//! Content evaluation gate for the flowgate platform.
//!
//! Before a side-effecting action executes, its rendered arguments pass
//! through a three-tier pipeline:
//!
//! 1. **Schema validation** — structural check against the action's
//!    declared argument shape; failure is an immediate hard block
//! 2. **L1 deterministic assertions** — placeholder, empty-field,
//!    profanity, and language checks with block/warn severity
//! 3. **L2 rule-based score** — 0-100 across four weighted dimensions;
//!    below threshold means the action requires human approval
//! 4. **L3 judge escalation** — an independent LLM judging irreversible
//!    actions, fail-safe to requires-approval on timeout or error
//!
//! The verdict precedence: any hard block wins outright; otherwise the
//! judge/L2 outcome decides auto-proceed vs requires-approval.

pub mod assertions;
pub mod error;
pub mod gate;
pub mod judge;
pub mod registry;
pub mod scoring;
pub mod verdict;

pub use assertions::{Assertion, AssertionCheck, AssertionFailure, Severity, default_assertions};
pub use error::GateError;
pub use gate::{EvaluationGate, GateConfig, GateInput};
pub use judge::{Judge, JudgeConfig, JudgeOutcome, JudgePolicy};
pub use registry::{ActionRegistry, ActionSpec, ArgField, ArgKind};
pub use scoring::{DimensionScore, ScoreBreakdown, ScoreWeights, score_content};
pub use verdict::EvalVerdict;
