//! Wire types for the generation backend's HTTP surface

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque backend-issued conversation token
///
/// Never constructed from anything but a backend response (or a user typing one
/// back in); its internal structure is not interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque backend-issued document token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `GET health`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub model_loaded: bool,
}

/// One entry of `GET models`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub filename: String,
    #[serde(default)]
    pub size_gb: f64,
    #[serde(default)]
    pub description: String,
}

/// `GET models/current`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentModel {
    pub loaded: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub info: Option<ModelDetails>,
}

/// Extra metadata the backend may attach to the current model
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub context_size: Option<u64>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// `POST upload` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedDocument {
    pub file_id: DocumentId,
    /// Extracted text. Some backends only send a preview under `content_preview`.
    #[serde(alias = "content_preview")]
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// `POST chat` body, built fresh for every turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub documents: Vec<String>,
    pub json_schema: Option<Value>,
    pub max_tokens: u32,
}

/// `POST chat` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationResponse {
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    /// Set by backends that report inference failures with a success status
    #[serde(default)]
    pub error: bool,
}

/// `POST conversations/branch` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchRequest {
    pub conversation_id: ConversationId,
    pub branch_point: usize,
}

/// A conversation as stored by the backend
///
/// Returned by `POST conversations/branch` and `GET conversations`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub parent_id: Option<ConversationId>,
    #[serde(default)]
    pub branch_point: Option<usize>,
}

/// Failure body shape used by the backend for non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Value,
}
