//! Flow execution engine for the flowgate platform.
//!
//! A flow is a user-composed directed graph of nodes (trigger, LLM step,
//! action, branch) executed against live conversation context. The
//! engine walks the graph deterministically, renders action arguments
//! from upstream outputs, routes side-effecting actions through the
//! evaluation gate, and emits a lifecycle event per transition.
//!
//! Runs always finalize in exactly one terminal state: completed,
//! failed, awaiting confirmation, or cancelled. A run paused on a gated
//! action is continued with [`Engine::resolve_confirmation`]; a failed
//! run is re-driven from the failure point with [`Engine::resume`],
//! replaying prior outputs so completed side effects never repeat.

pub mod context;
pub mod edge;
pub mod engine;
pub mod error;
pub mod event;
pub mod executor;
pub mod graph;
pub mod node;
pub mod resume;
pub mod settings;

pub use context::{ExecutionContext, NodeOutput};
pub use edge::{Edge, EdgeId};
pub use engine::{BlockedAction, Engine, PendingConfirmation, RunStatus, RunSummary};
pub use error::{FlowError, GraphInputError};
pub use event::{ChannelSink, CollectingSink, EventKind, EventSink, EventSinkError, LifecycleEvent};
pub use executor::{ExecOutcome, NodeExecutor, NodeFailure, StandardExecutor};
pub use graph::FlowGraph;
pub use node::{BranchRule, Node, NodeConfig, NodeId, Position, Predicate, PredicateOp};
pub use resume::{ConfirmationDecision, RetrySeed};
pub use settings::EngineSettings;
