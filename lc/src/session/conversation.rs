//! Conversation identity and lineage
//!
//! Owns the backend-issued conversation id (or none), the local transcript and
//! the stack of lineages left behind by branching. The id is only ever
//! replaced by a value the backend returned.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{ChatError, ChatResult};
use super::events::{EventSink, SessionEvent};
use super::{bounded, lock};
use crate::backend::{Backend, BranchRequest, ConversationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One committed message
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Model that produced an assistant turn
    pub model: Option<String>,
    pub at: DateTime<Utc>,
    /// Stored by the backend; a user turn whose generation failed never is
    pub committed: bool,
}

/// A lineage left behind by `branch`
#[derive(Debug, Clone)]
pub struct BranchRecord {
    pub parent: ConversationId,
    pub child: ConversationId,
    pub branch_point: usize,
    parent_transcript: Vec<Turn>,
}

#[derive(Debug, Default)]
struct ConversationState {
    identity: Option<ConversationId>,
    transcript: Vec<Turn>,
    lineage: Vec<BranchRecord>,
    /// Bumped whenever identity is reset or swapped outside a turn
    epoch: u64,
}

/// Conversation session manager
pub struct ConversationManager {
    backend: Arc<dyn Backend>,
    state: Mutex<ConversationState>,
    timeout: Duration,
    events: EventSink,
}

impl ConversationManager {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration, events: EventSink) -> Self {
        Self {
            backend,
            state: Mutex::new(ConversationState::default()),
            timeout,
            events,
        }
    }

    /// Current identity; `None` until the first successful turn
    pub fn identity(&self) -> Option<ConversationId> {
        lock(&self.state).identity.clone()
    }

    pub(crate) fn epoch(&self) -> u64 {
        lock(&self.state).epoch
    }

    pub fn transcript(&self) -> Vec<Turn> {
        lock(&self.state).transcript.clone()
    }

    /// Lineages branched away from, oldest first
    pub fn lineage(&self) -> Vec<BranchRecord> {
        lock(&self.state).lineage.clone()
    }

    /// The conversation this one was branched from
    pub fn parent(&self) -> Option<ConversationId> {
        lock(&self.state).lineage.last().map(|r| r.parent.clone())
    }

    /// Reset to no conversation; never fails and makes no backend call
    pub fn start_new(&self) {
        debug!("start_new: called");
        {
            let mut state = lock(&self.state);
            state.identity = None;
            state.transcript.clear();
            state.lineage.clear();
            state.epoch += 1;
        }
        self.events.emit(SessionEvent::ConversationStarted);
    }

    pub(crate) fn record_user(&self, content: &str) {
        lock(&self.state).transcript.push(Turn {
            role: Role::User,
            content: content.to_string(),
            model: None,
            at: Utc::now(),
            committed: false,
        });
    }

    /// Turns the backend holds for the active conversation
    fn committed_len(transcript: &[Turn]) -> usize {
        transcript.iter().filter(|t| t.committed).count()
    }

    /// Adopt a turn's result unless the session moved on since `epoch`
    pub(crate) fn complete_turn(&self, epoch: u64, content: &str, model: Option<&str>, id: ConversationId) -> bool {
        let mut state = lock(&self.state);
        if state.epoch != epoch {
            debug!(expected = epoch, actual = state.epoch, "complete_turn: stale response discarded");
            return false;
        }
        if let Some(pending) = state.transcript.last_mut().filter(|t| t.role == Role::User) {
            pending.committed = true;
        }
        state.transcript.push(Turn {
            role: Role::Assistant,
            content: content.to_string(),
            model: model.map(str::to_string),
            at: Utc::now(),
            committed: true,
        });
        if state.identity.as_ref() != Some(&id) {
            info!(conversation_id = %id, "complete_turn: adopting backend identity");
        }
        state.identity = Some(id);
        true
    }

    /// Fork the active conversation at `branch_point` messages
    ///
    /// The point counts only committed turns, the messages the backend
    /// actually stored. `None` branches after the last of them. On success
    /// the local transcript becomes the committed turns up to the branch
    /// point and the previous lineage is kept for `restore_parent`.
    pub async fn branch(&self, branch_point: Option<usize>, cancel: &CancellationToken) -> ChatResult<ConversationId> {
        debug!(?branch_point, "branch: called");
        let (parent, point, epoch) = {
            let state = lock(&self.state);
            let parent = state.identity.clone().ok_or(ChatError::NoActiveConversation)?;
            let available = Self::committed_len(&state.transcript);
            let point = branch_point.unwrap_or(available);
            if point == 0 || point > available {
                return Err(ChatError::InvalidBranchPoint {
                    requested: point,
                    available,
                });
            }
            (parent, point, state.epoch)
        };

        let request = BranchRequest {
            conversation_id: parent.clone(),
            branch_point: point,
        };
        let record = bounded(self.backend.branch(request), self.timeout, cancel)
            .await
            .inspect_err(|e| warn!(error = %e, "branch: failed"))?;
        let child = record.id;

        {
            let mut state = lock(&self.state);
            if state.epoch != epoch {
                debug!("branch: session reset while branching, discarding");
                return Err(ChatError::Cancelled);
            }
            let parent_transcript = state.transcript.clone();
            state.transcript = parent_transcript
                .iter()
                .filter(|t| t.committed)
                .take(point)
                .cloned()
                .collect();
            state.lineage.push(BranchRecord {
                parent: parent.clone(),
                child: child.clone(),
                branch_point: point,
                parent_transcript,
            });
            state.identity = Some(child.clone());
            state.epoch += 1;
        }

        info!(%parent, %child, branch_point = point, "branch: switched to new lineage");
        self.events.emit(SessionEvent::ConversationBranched {
            parent,
            child: child.clone(),
            branch_point: point,
        });
        Ok(child)
    }

    /// Return to the lineage the last branch left
    pub fn restore_parent(&self) -> Option<ConversationId> {
        debug!("restore_parent: called");
        let mut state = lock(&self.state);
        let record = state.lineage.pop()?;
        state.identity = Some(record.parent.clone());
        state.transcript = record.parent_transcript;
        state.epoch += 1;
        info!(parent = %record.parent, child = %record.child, "restore_parent: restored");
        Some(record.parent)
    }
}
