//! Generation request orchestration
//!
//! `ChatSession` is the session context object: it owns the document set,
//! schema, model coordinator, conversation manager and the in-flight gate,
//! and composes them into one backend request per user turn.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::conversation::{BranchRecord, ConversationManager, Turn};
use super::documents::{DocumentContext, DocumentSet};
use super::error::{ChatError, ChatResult};
use super::events::{EventSink, SessionEvent};
use super::flight::{Activity, FlightGate};
use super::model::{ModelCoordinator, ModelState};
use super::schema::{SchemaController, SchemaOutcome};
use super::{bounded, lock};
use crate::backend::{
    Backend, BackendError, ConversationId, ConversationRecord, DocumentId, GenerationRequest, GenerationResponse,
    HealthStatus, ModelInfo,
};
use crate::config::Config;

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Output-length budget sent with every turn
    pub max_tokens: u32,
    /// Budget for each generation, load, upload and branch call
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_tokens: config.chat.max_tokens,
            timeout: Duration::from_millis(config.backend.timeout_ms),
        }
    }
}

/// A successful turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub content: String,
    pub model: Option<String>,
    pub conversation_id: ConversationId,
}

/// One user's chat session against one backend
pub struct ChatSession {
    backend: Arc<dyn Backend>,
    documents: Mutex<DocumentSet>,
    schema: Mutex<SchemaController>,
    models: ModelCoordinator,
    conversation: ConversationManager,
    gate: FlightGate,
    cancel: Mutex<CancellationToken>,
    events: EventSink,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, options: SessionOptions) -> Self {
        debug!(?options, "ChatSession::new: called");
        let events = EventSink::default();
        Self {
            models: ModelCoordinator::new(backend.clone(), options.timeout, events.clone()),
            conversation: ConversationManager::new(backend.clone(), options.timeout, events.clone()),
            backend,
            documents: Mutex::new(DocumentSet::new()),
            schema: Mutex::new(SchemaController::new()),
            gate: FlightGate::new(),
            cancel: Mutex::new(CancellationToken::new()),
            events,
            options,
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // === Turns ===

    /// Send one user message and wait for the assistant's answer
    ///
    /// Guards run in order and send nothing when they fail: blank input,
    /// another operation in flight, no model loaded (asked of the backend,
    /// not cached). Past the guards the user turn is committed even if
    /// generation then fails.
    pub async fn submit_turn(&self, message: &str) -> ChatResult<TurnReply> {
        debug!(message_len = message.len(), "submit_turn: called");
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let _ticket = self.gate.claim(Activity::Generating).map_err(|holder| match holder {
            Activity::LoadingModel => ChatError::NoModelLoaded,
            _ => ChatError::GenerationInProgress,
        })?;

        let epoch = self.conversation.epoch();
        let cancel = self.fresh_token();

        let state = bounded(self.models.refresh_status(), self.options.timeout, &cancel).await?;
        if !state.is_loaded() {
            debug!(?state, "submit_turn: no model loaded");
            return Err(ChatError::NoModelLoaded);
        }

        let request = self.compose_request(message);

        self.conversation.record_user(message);
        self.events.emit(SessionEvent::UserTurn {
            content: message.to_string(),
        });

        let result = bounded(self.backend.generate(request), self.options.timeout, &cancel)
            .await
            .and_then(|response| self.reconcile(epoch, response, &state));

        match &result {
            Ok(reply) => {
                info!(conversation_id = %reply.conversation_id, model = ?reply.model, "submit_turn: completed");
                self.events.emit(SessionEvent::AssistantTurn {
                    content: reply.content.clone(),
                    model: reply.model.clone(),
                    conversation_id: reply.conversation_id.clone(),
                });
            }
            Err(e) => {
                warn!(error = %e, "submit_turn: failed");
                self.events.emit(SessionEvent::TurnFailed {
                    kind: e.kind(),
                    detail: e.to_string(),
                });
            }
        }
        result
    }

    /// Point-in-time request; later document or schema edits do not reach it
    fn compose_request(&self, message: &str) -> GenerationRequest {
        GenerationRequest {
            message: message.to_string(),
            conversation_id: self.conversation.identity(),
            documents: lock(&self.documents).snapshot_contents(),
            json_schema: lock(&self.schema).current().cloned(),
            max_tokens: self.options.max_tokens,
        }
    }

    fn reconcile(&self, epoch: u64, response: GenerationResponse, state: &ModelState) -> ChatResult<TurnReply> {
        if response.error {
            return Err(BackendError::Rejected {
                status: 200,
                detail: response.response,
            }
            .into());
        }

        let conversation_id = response.conversation_id.ok_or_else(|| {
            BackendError::InvalidResponse("generation response carried no conversation_id".to_string())
        })?;
        let model = response.model.or_else(|| state.loaded_name().map(str::to_string));

        if !self
            .conversation
            .complete_turn(epoch, &response.response, model.as_deref(), conversation_id.clone())
        {
            return Err(ChatError::Cancelled);
        }

        Ok(TurnReply {
            content: response.response,
            model,
            conversation_id,
        })
    }

    fn fresh_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.cancel) = token.clone();
        token
    }

    /// Abort the outstanding backend call, if any
    pub fn cancel_generation(&self) {
        debug!("cancel_generation: called");
        lock(&self.cancel).cancel();
    }

    pub fn is_generating(&self) -> bool {
        self.gate.is_generating()
    }

    pub fn activity(&self) -> Activity {
        self.gate.current()
    }

    // === Conversation ===

    pub fn identity(&self) -> Option<ConversationId> {
        self.conversation.identity()
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.conversation.transcript()
    }

    pub fn lineage(&self) -> Vec<BranchRecord> {
        self.conversation.lineage()
    }

    pub fn parent(&self) -> Option<ConversationId> {
        self.conversation.parent()
    }

    /// Forget the current conversation; an answer still in flight is dropped
    pub fn start_new(&self) {
        debug!("start_new: called");
        self.cancel_generation();
        self.conversation.start_new();
    }

    /// Branch the active conversation into a new lineage
    pub async fn branch(&self, branch_point: Option<usize>) -> ChatResult<ConversationId> {
        debug!(?branch_point, "branch: called");
        if self.conversation.identity().is_none() {
            return Err(ChatError::NoActiveConversation);
        }
        let _ticket = self
            .gate
            .claim(Activity::Branching)
            .map_err(|_| ChatError::GenerationInProgress)?;

        let cancel = self.fresh_token();
        self.conversation.branch(branch_point, &cancel).await
    }

    /// Switch back to the lineage the last branch left
    pub fn restore_parent(&self) -> ChatResult<Option<ConversationId>> {
        let _ticket = self
            .gate
            .claim(Activity::Branching)
            .map_err(|_| ChatError::GenerationInProgress)?;
        Ok(self.conversation.restore_parent())
    }

    pub async fn list_conversations(&self) -> ChatResult<Vec<ConversationRecord>> {
        Ok(self.backend.list_conversations().await?)
    }

    /// Delete a stored conversation; deleting the active one starts fresh
    pub async fn delete_conversation(&self, id: &ConversationId) -> ChatResult<()> {
        debug!(%id, "delete_conversation: called");
        bounded(
            self.backend.delete_conversation(id),
            self.options.timeout,
            &CancellationToken::new(),
        )
        .await?;
        if self.conversation.identity().as_ref() == Some(id) {
            self.start_new();
        }
        Ok(())
    }

    // === Documents ===

    pub fn documents(&self) -> Vec<DocumentContext> {
        lock(&self.documents).iter().cloned().collect()
    }

    /// Attach already-extracted content
    pub fn add_document(&self, id: DocumentId, name: &str, content: &str) -> ChatResult<bool> {
        let (added, attached) = {
            let mut docs = lock(&self.documents);
            let added = docs.add(id.clone(), name, content)?;
            (added, docs.len())
        };
        debug!(%id, added, attached, "add_document: done");
        if added {
            self.events.emit(SessionEvent::DocumentAttached {
                id,
                name: name.to_string(),
            });
        }
        Ok(added)
    }

    /// Upload a file for extraction and attach the result
    pub async fn attach_file(&self, path: &Path) -> ChatResult<DocumentContext> {
        debug!(path = %path.display(), "attach_file: called");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = tokio::fs::read(path).await.map_err(|e| ChatError::InvalidDocument {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let uploaded = bounded(
            self.backend.upload_document(&name, bytes),
            self.options.timeout,
            &CancellationToken::new(),
        )
        .await?;

        self.add_document(uploaded.file_id.clone(), &name, &uploaded.content)?;
        info!(id = %uploaded.file_id, %name, "attach_file: attached");
        Ok(DocumentContext {
            id: uploaded.file_id,
            display_name: name,
            content: uploaded.content,
        })
    }

    pub fn remove_document(&self, id: &DocumentId) -> bool {
        let removed = lock(&self.documents).remove(id).is_some();
        if removed {
            self.events.emit(SessionEvent::DocumentRemoved { id: id.clone() });
        }
        removed
    }

    // === Schema ===

    pub fn apply_schema(&self, raw: &str) -> ChatResult<SchemaOutcome> {
        lock(&self.schema).apply(raw)
    }

    pub fn clear_schema(&self) {
        lock(&self.schema).clear();
    }

    pub fn schema(&self) -> Option<Value> {
        lock(&self.schema).current().cloned()
    }

    // === Models ===

    pub fn model_state(&self) -> ModelState {
        self.models.state()
    }

    /// Load a model; refused while a turn or another load is in flight
    pub async fn load_model(&self, name: &str) -> ChatResult<()> {
        debug!(%name, "load_model: called");
        if name.trim().is_empty() {
            return Err(ChatError::NoSelection);
        }
        let _ticket = self.gate.claim(Activity::LoadingModel).map_err(|holder| match holder {
            Activity::LoadingModel => ChatError::AlreadyLoading,
            _ => ChatError::GenerationInProgress,
        })?;
        self.models.load_model(name).await
    }

    pub async fn refresh_status(&self) -> ChatResult<ModelState> {
        Ok(self.models.refresh_status().await?)
    }

    /// Make sure some model is loaded, preferring `preferred`
    ///
    /// Returns the name loaded, or `None` when one already was or there is
    /// nothing to load.
    pub async fn auto_load(&self, preferred: Option<&str>) -> ChatResult<Option<String>> {
        debug!(?preferred, "auto_load: called");
        if self.refresh_status().await?.is_loaded() {
            return Ok(None);
        }

        let choice = match preferred {
            Some(name) => Some(name.to_string()),
            None => self.list_models().await?.into_iter().next().map(|m| m.filename),
        };

        match choice {
            Some(name) => {
                self.load_model(&name).await?;
                Ok(Some(name))
            }
            None => {
                info!("auto_load: backend has no models");
                Ok(None)
            }
        }
    }

    pub async fn list_models(&self) -> ChatResult<Vec<ModelInfo>> {
        Ok(self.backend.list_models().await?)
    }

    pub async fn health(&self) -> ChatResult<HealthStatus> {
        Ok(self.backend.health().await?)
    }
}
