//! Backend module for LocalChat
//!
//! The locally hosted generation backend: health and model probes, model
//! loading, document upload, generation and conversation branching.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod http;
mod types;

pub use client::Backend;
pub use error::BackendError;
pub use http::HttpBackend;
pub use types::{
    BranchRequest, ConversationId, ConversationRecord, CurrentModel, DocumentId, GenerationRequest,
    GenerationResponse, HealthStatus, ModelDetails, ModelInfo, UploadedDocument,
};

use crate::config::BackendConfig;

/// Create the backend client described by the config
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    debug!(base_url = %config.base_url, "create_backend: called");
    Ok(Arc::new(HttpBackend::from_config(config)?))
}
