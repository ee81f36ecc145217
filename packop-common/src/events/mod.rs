//! Event types for the pack reveal event system
//!
//! Provides shared event definitions and the EventBus used by the resolver,
//! the stage sequencer and the HTTP surface.

mod reveal_types;

pub use reveal_types::{CueKind, ResolutionStatus, Stage};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Reveal event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RevealEvent {
    /// A new stage run began (previous run, if any, already cancelled)
    RunStarted {
        reference: String,
        ordinal: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A run entered a stage
    StageEntered {
        reference: String,
        ordinal: u32,
        stage: Stage,
        /// Offset of the stage from run start
        offset_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A run reached Complete and its completion callback was invoked
    RunCompleted {
        reference: String,
        ordinal: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A run was superseded or torn down before Complete
    RunCancelled {
        reference: String,
        ordinal: u32,
        /// Last stage the run had entered
        last_stage: Stage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An audio cue was handed to the cue player
    CueTriggered {
        cue: CueKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resolution of a content reference began
    ResolutionStarted {
        run: u64,
        reference: String,
        candidate_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One candidate failed to load (absorbed, next candidate follows backoff)
    CandidateFailed {
        run: u64,
        index: usize,
        url: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resolution reached a terminal state
    ResolutionFinished {
        run: u64,
        reference: String,
        status: ResolutionStatus,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Skip affordance invoked by the user
    SkipRequested {
        ordinal: u32,
        total: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A multi-card pack session ended
    PackFinished {
        revealed: usize,
        skipped: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RevealEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RevealEvent::RunStarted { .. } => "RunStarted",
            RevealEvent::StageEntered { .. } => "StageEntered",
            RevealEvent::RunCompleted { .. } => "RunCompleted",
            RevealEvent::RunCancelled { .. } => "RunCancelled",
            RevealEvent::CueTriggered { .. } => "CueTriggered",
            RevealEvent::ResolutionStarted { .. } => "ResolutionStarted",
            RevealEvent::CandidateFailed { .. } => "CandidateFailed",
            RevealEvent::ResolutionFinished { .. } => "ResolutionFinished",
            RevealEvent::SkipRequested { .. } => "SkipRequested",
            RevealEvent::PackFinished { .. } => "PackFinished",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use packop_common::events::{EventBus, RevealEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RevealEvent::RunStarted {
///     reference: "ipfs://Qm".to_string(),
///     ordinal: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RevealEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RevealEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RevealEvent,
    ) -> Result<usize, broadcast::error::SendError<RevealEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RevealEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_event(stage: Stage) -> RevealEvent {
        RevealEvent::StageEntered {
            reference: "ipfs://QmHash".to_string(),
            ordinal: 1,
            stage,
            offset_ms: stage.offset_ms(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(stage_event(Stage::Summon)).is_err());
        // Lossy emit must not panic
        bus.emit_lossy(stage_event(Stage::Summon));
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit(stage_event(Stage::Reveal)).unwrap(), 1);

        match rx.recv().await.unwrap() {
            RevealEvent::StageEntered { stage, offset_ms, .. } => {
                assert_eq!(stage, Stage::Reveal);
                assert_eq!(offset_ms, 4_500);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(stage_event(Stage::Entangle)).unwrap();
        assert_eq!(json["type"], "StageEntered");
        assert_eq!(json["stage"], "entangle");
        assert_eq!(json["offset_ms"], 1_500);
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = RevealEvent::ResolutionFinished {
            run: 3,
            reference: "ipfs://QmHash".to_string(),
            status: ResolutionStatus::Resolved,
            url: "https://ipfs.io/ipfs/QmHash".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
    }
}
