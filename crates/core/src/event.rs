//! Observability events — purely informational, never control flow.
//!
//! The controller publishes what it is about to do and what happened;
//! subscribers (a progress renderer, a log sink) filter for what they care
//! about. Dropped events are acceptable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::action::ExecutionStatus;
use crate::message::ConversationId;

/// Everything the turn loop reports while it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// The model attached free-text reasoning to an action call.
    Reasoning {
        conversation_id: ConversationId,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// An action is about to be dispatched.
    ActionStarted {
        conversation_id: ConversationId,
        request_id: String,
        action: String,
        timestamp: DateTime<Utc>,
    },

    /// An action reached a terminal result.
    ActionFinished {
        conversation_id: ConversationId,
        request_id: String,
        action: String,
        status: ExecutionStatus,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model gateway failed and the turn is ending.
    GatewayFailed {
        conversation_id: ConversationId,
        detail: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based bus for [`AgentEvent`]s.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub; publishing
/// with no subscribers is a no-op.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
