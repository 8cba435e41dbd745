//! Session events
//!
//! Everything a presentation layer needs to render a session: committed
//! turns, failures and state changes. Delivered over a tokio broadcast
//! channel; emission is fire-and-forget.

use tokio::sync::broadcast;
use tracing::debug;

use super::error::ErrorKind;
use super::model::ModelState;
use crate::backend::{ConversationId, DocumentId};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The user's message was committed; recorded even if generation fails
    UserTurn { content: String },
    /// The backend answered
    AssistantTurn {
        content: String,
        model: Option<String>,
        conversation_id: ConversationId,
    },
    /// A turn ended without an answer
    TurnFailed { kind: ErrorKind, detail: String },
    ModelStateChanged { state: ModelState },
    DocumentAttached { id: DocumentId, name: String },
    DocumentRemoved { id: DocumentId },
    /// Identity reset to none
    ConversationStarted,
    ConversationBranched {
        parent: ConversationId,
        child: ConversationId,
        branch_point: usize,
    },
}

impl SessionEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::UserTurn { .. } => "UserTurn",
            SessionEvent::AssistantTurn { .. } => "AssistantTurn",
            SessionEvent::TurnFailed { .. } => "TurnFailed",
            SessionEvent::ModelStateChanged { .. } => "ModelStateChanged",
            SessionEvent::DocumentAttached { .. } => "DocumentAttached",
            SessionEvent::DocumentRemoved { .. } => "DocumentRemoved",
            SessionEvent::ConversationStarted => "ConversationStarted",
            SessionEvent::ConversationBranched { .. } => "ConversationBranched",
        }
    }
}

/// Cloneable emitter handle
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit to all current subscribers; dropped when there are none
    pub fn emit(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "EventSink::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
