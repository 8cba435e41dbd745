//! Backend trait definition

use async_trait::async_trait;

use super::{
    BackendError, BranchRequest, ConversationId, ConversationRecord, CurrentModel, GenerationRequest,
    GenerationResponse, HealthStatus, ModelInfo, UploadedDocument,
};

/// The generation backend as seen by this client
///
/// Model loading, inference, document extraction and conversation storage all
/// live on the other side of this trait. Identifiers it hands back are opaque.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Liveness probe
    async fn health(&self) -> Result<HealthStatus, BackendError>;

    /// Models available for loading
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    /// Authoritative view of the currently loaded model
    async fn current_model(&self) -> Result<CurrentModel, BackendError>;

    /// Load a model by file name
    async fn load_model(&self, name: &str) -> Result<(), BackendError>;

    /// Upload raw file bytes; the backend extracts and returns the text
    async fn upload_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedDocument, BackendError>;

    /// Generate one assistant turn
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, BackendError>;

    /// Fork a conversation at a cut point into a new lineage
    async fn branch(&self, request: BranchRequest) -> Result<ConversationRecord, BackendError>;

    /// Conversations the backend has stored
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, BackendError>;

    /// Delete a stored conversation
    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), BackendError>;
}
