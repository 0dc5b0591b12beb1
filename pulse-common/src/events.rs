//! Event types for the MarketPulse event system
//!
//! Provides shared event definitions and the EventBus for both services.
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission to the external UI/notification layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// MarketPulse event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PulseEvent {
    /// Envelope passed all guard checks and was appended to the event store
    EnvelopeAccepted {
        tenant_id: String,
        event_id: String,
        event_type: String,
        timestamp: DateTime<Utc>,
    },

    /// Envelope was rejected (reason is the machine-readable ack status)
    EnvelopeRejected {
        tenant_id: String,
        event_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Recompute job reached `completed`
    JobCompleted {
        job_id: String,
        entity_id: String,
        period: String,
        timestamp: DateTime<Utc>,
    },

    /// Recompute job failed (may still be retried by the sweep)
    JobFailed {
        job_id: String,
        entity_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A new ScoreRecord was written
    ScoreComputed {
        entity_id: String,
        metric_name: String,
        value: f64,
        timestamp: DateTime<Utc>,
    },

    /// A notification record was emitted for a significant score delta
    NotificationEmitted {
        entity_id: String,
        kind: String,
        metric_name: String,
        delta: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast event bus shared across service tasks
///
/// Wraps tokio::broadcast: subscribers receive events emitted after they
/// subscribe; slow subscribers drop the oldest buffered events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PulseEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PulseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the subscriber count, or 0 if nobody is listening (not an
    /// error: the bus is an observability surface, not a delivery queue).
    pub fn emit(&self, event: PulseEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}
