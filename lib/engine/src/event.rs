//! Lifecycle events and the event sink seam.
//!
//! The engine emits one event per transition, in strict chronological
//! order, with a per-run monotonically increasing sequence number and a
//! wall-clock timestamp. Events leave the engine through an [`EventSink`];
//! the engine never persists them itself.

use crate::context::NodeOutput;
use crate::error::FlowError;
use crate::node::NodeId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowgate_core::RunId;
use flowgate_gate::EvalVerdict;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// The run this event belongs to.
    pub run_id: RunId,
    /// Monotonically increasing position within the run, starting at 0.
    pub seq: u64,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A node began executing.
    NodeStart { node_id: NodeId },
    /// A node finished successfully.
    NodeComplete { node_id: NodeId, output: NodeOutput },
    /// A node's prior output was replayed from a resume seed.
    NodeReused { node_id: NodeId },
    /// A node was skipped (unselected branch handle or rejection).
    NodeSkipped { node_id: NodeId, reason: String },
    /// A node executor failed.
    NodeError {
        node_id: NodeId,
        error: String,
        retryable: bool,
    },
    /// The gate hard-blocked an action; the adapter was never invoked.
    ActionBlocked {
        node_id: NodeId,
        action_type: String,
        verdict: EvalVerdict,
    },
    /// An action needs human approval before it can execute.
    AwaitingConfirmation {
        node_id: NodeId,
        action_type: String,
        args: JsonValue,
        verdict: EvalVerdict,
    },
    /// The run finalized with a failure.
    FlowError { error: FlowError },
    /// The run finalized without a failure.
    FlowComplete,
}

/// Receives lifecycle events as they are emitted.
///
/// Implementations must not block the run for long; the engine treats a
/// sink failure as non-fatal and continues.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered.
    async fn emit(&self, event: LifecycleEvent) -> Result<(), EventSinkError>;
}

/// Errors from event delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSinkError {
    /// The receiving side is gone.
    Closed,
    /// Delivery failed for another reason.
    DeliveryFailed { reason: String },
}

impl std::fmt::Display for EventSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "event channel closed"),
            Self::DeliveryFailed { reason } => write!(f, "event delivery failed: {reason}"),
        }
    }
}

impl std::error::Error for EventSinkError {}

/// Delivers events over a tokio mpsc channel.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving half of its channel.
    #[must_use]
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: LifecycleEvent) -> Result<(), EventSinkError> {
        self.sender.send(event).map_err(|_| EventSinkError::Closed)
    }
}

/// Collects events in memory. Useful in tests and for embedders that
/// inspect a finished run as a whole.
#[derive(Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl CollectingSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the collected events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("sink lock").clone()
    }

    /// Returns a handle sharing this sink's storage.
    #[must_use]
    pub fn handle(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: LifecycleEvent) -> Result<(), EventSinkError> {
        self.events.lock().expect("sink lock").push(event);
        Ok(())
    }
}

/// Stamps events with the run id, sequence number, and timestamp before
/// handing them to the sink.
pub(crate) struct EventRecorder {
    run_id: RunId,
    seq: u64,
    sink: Arc<dyn EventSink>,
}

impl EventRecorder {
    pub(crate) fn new(run_id: RunId, sink: Arc<dyn EventSink>) -> Self {
        Self {
            run_id,
            seq: 0,
            sink,
        }
    }

    /// Emits one event. Sink failures are logged and swallowed so a slow
    /// or closed consumer never fails the run.
    pub(crate) async fn emit(&mut self, kind: EventKind) {
        let event = LifecycleEvent {
            run_id: self.run_id,
            seq: self.seq,
            timestamp: Utc::now(),
            kind,
        };
        self.seq += 1;
        if let Err(err) = self.sink.emit(event).await {
            warn!(run_id = %self.run_id, error = %err, "dropping lifecycle event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recorder_assigns_monotonic_seq() {
        let sink = CollectingSink::new();
        let mut recorder = EventRecorder::new(RunId::new(), Arc::new(sink.handle()));

        recorder
            .emit(EventKind::NodeStart {
                node_id: NodeId::new(),
            })
            .await;
        recorder.emit(EventKind::FlowComplete).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 0);
        assert_eq!(events[1].seq, 1);
        assert!(events[0].timestamp <= events[1].timestamp);
    }

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (sink, mut receiver) = ChannelSink::new();
        let run_id = RunId::new();
        sink.emit(LifecycleEvent {
            run_id,
            seq: 0,
            timestamp: Utc::now(),
            kind: EventKind::FlowComplete,
        })
        .await
        .expect("delivery");

        let received = receiver.recv().await.expect("event");
        assert_eq!(received.run_id, run_id);
    }

    #[tokio::test]
    async fn channel_sink_reports_closed() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        let result = sink
            .emit(LifecycleEvent {
                run_id: RunId::new(),
                seq: 0,
                timestamp: Utc::now(),
                kind: EventKind::FlowComplete,
            })
            .await;
        assert_eq!(result, Err(EventSinkError::Closed));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = LifecycleEvent {
            run_id: RunId::new(),
            seq: 3,
            timestamp: Utc::now(),
            kind: EventKind::NodeSkipped {
                node_id: NodeId::new(),
                reason: "branch not selected".to_string(),
            },
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "node_skipped");
        assert_eq!(json["seq"], 3);
    }
}
