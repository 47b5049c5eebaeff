//! Domain events for observing agent runs.
//!
//! The loop publishes an event on every transition; the CLI or tests can
//! subscribe without the loop knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::state::Phase;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The loop entered a new phase
    PhaseEntered {
        session_id: String,
        phase: Phase,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A memory was stored or retrieved
    MemoryAccessed {
        operation: String, // "add", "retrieve"
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A run reached its terminal state
    RunFinished {
        session_id: String,
        steps: u32,
        errored: bool,
        timestamp: DateTime<Utc>,
    },

    /// An error was recorded into the run state
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
