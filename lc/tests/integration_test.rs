//! Integration tests for LocalChat
//!
//! These drive a `ChatSession` end to end against a scripted backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use localchat::backend::{
    Backend, BackendError, BranchRequest, ConversationId, ConversationRecord, CurrentModel, DocumentId,
    GenerationRequest, GenerationResponse, HealthStatus, ModelInfo, UploadedDocument,
};
use localchat::{ChatSession, ErrorKind, ModelState, SessionEvent, SessionOptions};

// =============================================================================
// Scripted backend
// =============================================================================

#[derive(Default)]
struct Script {
    loaded: Option<String>,
    replies: VecDeque<GenerationResponse>,
    branches: VecDeque<ConversationId>,
    generations: Vec<GenerationRequest>,
    branch_requests: Vec<BranchRequest>,
}

#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<Script>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedBackend {
    fn loaded(name: &str) -> Self {
        let backend = Self::default();
        backend.script.lock().unwrap().loaded = Some(name.to_string());
        backend
    }

    fn held(name: &str) -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut backend = Self::loaded(name);
        backend.gate = Some((entered.clone(), release.clone()));
        (backend, entered, release)
    }

    fn reply(&self, text: &str, conversation_id: &str) {
        self.script.lock().unwrap().replies.push_back(GenerationResponse {
            response: text.to_string(),
            model: None,
            conversation_id: Some(ConversationId::new(conversation_id)),
            timestamp: None,
            tokens_used: None,
            error: false,
        });
    }

    fn generations(&self) -> Vec<GenerationRequest> {
        self.script.lock().unwrap().generations.clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn health(&self) -> Result<HealthStatus, BackendError> {
        Ok(HealthStatus {
            status: Some("healthy".to_string()),
            offline: true,
            model_loaded: self.script.lock().unwrap().loaded.is_some(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(vec![ModelInfo {
            filename: "m1.gguf".to_string(),
            size_gb: 4.1,
            description: "test model".to_string(),
        }])
    }

    async fn current_model(&self) -> Result<CurrentModel, BackendError> {
        let loaded = self.script.lock().unwrap().loaded.clone();
        Ok(CurrentModel {
            loaded: loaded.is_some(),
            name: loaded,
            info: None,
        })
    }

    async fn load_model(&self, name: &str) -> Result<(), BackendError> {
        self.script.lock().unwrap().loaded = Some(name.to_string());
        Ok(())
    }

    async fn upload_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedDocument, BackendError> {
        Ok(UploadedDocument {
            file_id: DocumentId::new(format!("doc-{}", file_name)),
            content: String::from_utf8_lossy(&bytes).into_owned(),
            filename: Some(file_name.to_string()),
        })
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, BackendError> {
        self.script.lock().unwrap().generations.push(request);
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        self.script
            .lock()
            .unwrap()
            .replies
            .pop_front()
            .ok_or_else(|| BackendError::InvalidResponse("no scripted reply".to_string()))
    }

    async fn branch(&self, request: BranchRequest) -> Result<ConversationRecord, BackendError> {
        let mut script = self.script.lock().unwrap();
        let child = script
            .branches
            .pop_front()
            .ok_or_else(|| BackendError::InvalidResponse("no scripted branch".to_string()))?;
        let record = ConversationRecord {
            id: child,
            title: None,
            created_at: None,
            messages: vec![],
            parent_id: Some(request.conversation_id.clone()),
            branch_point: Some(request.branch_point),
        };
        script.branch_requests.push(request);
        Ok(record)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, BackendError> {
        Ok(vec![])
    }

    async fn delete_conversation(&self, _id: &ConversationId) -> Result<(), BackendError> {
        Ok(())
    }
}

fn session(backend: Arc<ScriptedBackend>) -> Arc<ChatSession> {
    Arc::new(ChatSession::new(
        backend,
        SessionOptions {
            max_tokens: 2048,
            timeout: Duration::from_secs(5),
        },
    ))
}

// =============================================================================
// Turn Tests
// =============================================================================

#[tokio::test]
async fn test_turn_carries_documents_and_schema_then_adopts_identity() {
    let backend = Arc::new(ScriptedBackend::loaded("m1"));
    backend.reply("{\"answer\":\"Widget\"}", "c42");
    backend.reply("second", "c42");
    let chat = session(backend.clone());

    chat.add_document(DocumentId::new("d1"), "Alpha", "Alpha text").unwrap();
    chat.add_document(DocumentId::new("d2"), "Beta", "Beta text").unwrap();
    chat.apply_schema(r#"{"type":"object","properties":{"answer":{"type":"string"}}}"#)
        .unwrap();

    let reply = chat.submit_turn("What is the product name?").await.unwrap();
    assert_eq!(reply.content, "{\"answer\":\"Widget\"}");
    assert_eq!(reply.model.as_deref(), Some("m1"));
    assert_eq!(chat.identity(), Some(ConversationId::new("c42")));

    let first = serde_json::to_value(&backend.generations()[0]).unwrap();
    assert_eq!(
        first,
        json!({
            "message": "What is the product name?",
            "conversation_id": null,
            "documents": ["Alpha text", "Beta text"],
            "json_schema": {"type": "object", "properties": {"answer": {"type": "string"}}},
            "max_tokens": 2048
        })
    );

    chat.submit_turn("And the price?").await.unwrap();
    assert_eq!(
        backend.generations()[1].conversation_id,
        Some(ConversationId::new("c42"))
    );
    assert_eq!(chat.transcript().len(), 4);
}

#[tokio::test]
async fn test_turn_without_model_sends_nothing() {
    let backend = Arc::new(ScriptedBackend::default());
    let chat = session(backend.clone());

    let err = chat.submit_turn("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoModelLoaded);
    assert!(backend.generations().is_empty());
    assert!(chat.transcript().is_empty());
}

#[tokio::test]
async fn test_second_turn_rejected_while_first_in_flight() {
    let (backend, entered, release) = ScriptedBackend::held("m1");
    let backend = Arc::new(backend);
    backend.reply("first", "c1");
    let chat = session(backend.clone());

    let first = tokio::spawn({
        let chat = chat.clone();
        async move { chat.submit_turn("one").await }
    });
    entered.notified().await;

    let err = chat.submit_turn("two").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationInProgress);
    let err = chat.load_model("m2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationInProgress);

    release.notify_one();
    let reply = first.await.unwrap().unwrap();
    assert_eq!(reply.content, "first");
    assert_eq!(backend.generations().len(), 1);
    assert!(!chat.is_generating());
}

#[tokio::test]
async fn test_documents_changed_mid_turn_do_not_leak_into_request() {
    let (backend, entered, release) = ScriptedBackend::held("m1");
    let backend = Arc::new(backend);
    backend.reply("ok", "c1");
    let chat = session(backend.clone());
    chat.add_document(DocumentId::new("d1"), "Alpha", "Alpha text").unwrap();

    let turn = tokio::spawn({
        let chat = chat.clone();
        async move { chat.submit_turn("summarize").await }
    });
    entered.notified().await;

    chat.add_document(DocumentId::new("d2"), "Beta", "Beta text").unwrap();
    chat.apply_schema(r#"{"type":"object"}"#).unwrap();

    release.notify_one();
    turn.await.unwrap().unwrap();

    let sent = &backend.generations()[0];
    assert_eq!(sent.documents, vec!["Alpha text".to_string()]);
    assert!(sent.json_schema.is_none());
}

#[tokio::test]
async fn test_cancel_frees_the_session() {
    let (backend, entered, _release) = ScriptedBackend::held("m1");
    let backend = Arc::new(backend);
    let chat = session(backend);

    let turn = tokio::spawn({
        let chat = chat.clone();
        async move { chat.submit_turn("long one").await }
    });
    entered.notified().await;
    chat.cancel_generation();

    let err = turn.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!chat.is_generating());
    assert_eq!(chat.identity(), None);
}

// =============================================================================
// Branching Tests
// =============================================================================

#[tokio::test]
async fn test_branch_then_restore_parent() {
    let backend = Arc::new(ScriptedBackend::loaded("m1"));
    backend.reply("a1", "c42");
    backend.reply("a2", "c42");
    backend
        .script
        .lock()
        .unwrap()
        .branches
        .push_back(ConversationId::new("c-b"));
    let chat = session(backend.clone());
    let mut events = chat.subscribe();

    chat.submit_turn("q1").await.unwrap();
    chat.submit_turn("q2").await.unwrap();

    let child = chat.branch(Some(2)).await.unwrap();
    assert_eq!(child, ConversationId::new("c-b"));
    assert_eq!(chat.identity(), Some(child.clone()));
    assert_eq!(chat.parent(), Some(ConversationId::new("c42")));
    assert_eq!(chat.transcript().len(), 2);
    assert_eq!(backend.script.lock().unwrap().branch_requests[0].branch_point, 2);

    let mut saw_branch = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ConversationBranched { branch_point, .. } = event {
            assert_eq!(branch_point, 2);
            saw_branch = true;
        }
    }
    assert!(saw_branch);

    assert_eq!(chat.restore_parent().unwrap(), Some(ConversationId::new("c42")));
    assert_eq!(chat.transcript().len(), 4);
}

#[tokio::test]
async fn test_branch_ignores_turn_whose_reply_failed() {
    let backend = Arc::new(ScriptedBackend::loaded("m1"));
    backend.reply("a1", "c42");
    backend
        .script
        .lock()
        .unwrap()
        .branches
        .push_back(ConversationId::new("c-b"));
    let chat = session(backend.clone());

    chat.submit_turn("q1").await.unwrap();
    let err = chat.submit_turn("q2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRejected);
    assert_eq!(chat.transcript().len(), 3);

    let err = chat.branch(Some(3)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBranchPoint);

    chat.branch(None).await.unwrap();
    assert_eq!(backend.script.lock().unwrap().branch_requests[0].branch_point, 2);
    let contents: Vec<String> = chat.transcript().into_iter().map(|t| t.content).collect();
    assert_eq!(contents, vec!["q1".to_string(), "a1".to_string()]);
}

#[tokio::test]
async fn test_branch_before_first_turn() {
    let backend = Arc::new(ScriptedBackend::loaded("m1"));
    let chat = session(backend.clone());

    let err = chat.branch(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveConversation);
    assert!(backend.script.lock().unwrap().branch_requests.is_empty());
}

// =============================================================================
// Model Tests
// =============================================================================

#[tokio::test]
async fn test_auto_load_picks_first_listed_model() {
    let backend = Arc::new(ScriptedBackend::default());
    let chat = session(backend);

    let loaded = chat.auto_load(None).await.unwrap();
    assert_eq!(loaded.as_deref(), Some("m1.gguf"));
    assert_eq!(
        chat.model_state(),
        ModelState::Loaded {
            name: "m1.gguf".to_string()
        }
    );
    assert_eq!(chat.auto_load(None).await.unwrap(), None);
}

#[tokio::test]
async fn test_attach_file_uploads_and_attaches() {
    let backend = Arc::new(ScriptedBackend::loaded("m1"));
    let chat = session(backend);
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "Widget costs 5").unwrap();

    let doc = chat.attach_file(&path).await.unwrap();
    assert_eq!(doc.id, DocumentId::new("doc-notes.txt"));
    assert_eq!(chat.documents().len(), 1);

    let err = chat.attach_file(&dir.path().join("missing.txt")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDocument);
}
