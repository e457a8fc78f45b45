//! Event types for the sync event system
//!
//! The engine reports progress by emitting `SyncEvent`s on an [`EventBus`];
//! whoever drives the engine (CLI, a UI front end) subscribes and renders
//! them. Emission is lossy by design: a run never blocks or fails because
//! nobody is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Sync engine event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A run started; `total_records` is the dataset size
    RunStarted {
        total_records: usize,
        timestamp: DateTime<Utc>,
    },

    /// Human-readable log line (skips, per-record errors, phase changes)
    LogMessage {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Emitted once per record touched by the reconciliation loop
    RecordProgress {
        current: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A run finished, successfully or not
    RunFinished {
        success: bool,
        unmatched_count: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus carrying [`SyncEvent`]s from the engine to subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity. Old events are
    /// dropped once the buffer is full and a subscriber lags behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events. Events emitted before subscription are
    /// not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring whether anyone is listening.
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
