//! Event types for the proctoring event system
//!
//! The server uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many broadcasting of
//!   proctoring events to the SSE monitor feed
//! - **Shared state** (Arc + pool): read-heavy access in handlers

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Proctoring event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProctorEvent {
    /// A violation was accepted by the integrity ledger
    ViolationRecorded {
        session_id: Uuid,
        violation_type: String,
        confidence: f64,
        /// Updated score after the penalty was applied
        integrity_score: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A student finished their session; grading has been scheduled
    SessionFinished {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Background grading completed and a result row was written
    GradingCompleted {
        session_id: Uuid,
        total_score: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// One-to-many event broadcaster backed by tokio::sync::broadcast
pub struct EventBus {
    tx: broadcast::Sender<ProctorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber
    /// exists, `Err` otherwise.
    pub fn emit(
        &self,
        event: ProctorEvent,
    ) -> Result<usize, broadcast::error::SendError<ProctorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case
    ///
    /// Used on hot paths where a missing monitor is not an error.
    pub fn emit_lossy(&self, event: ProctorEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
