//! HTTP implementation of the backend surface
//!
//! Talks JSON to the local backend's REST API. Non-2xx responses carry a
//! `{detail}` body which is surfaced verbatim. No retries are made.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::ErrorBody;
use super::{
    Backend, BackendError, BranchRequest, ConversationId, ConversationRecord, CurrentModel, GenerationRequest,
    GenerationResponse, HealthStatus, ModelInfo, UploadedDocument,
};
use crate::config::BackendConfig;

/// Backend reached over HTTP
pub struct HttpBackend {
    base: Url,
    http: Client,
    probe_timeout: Duration,
}

impl HttpBackend {
    /// Create a new backend client from configuration
    ///
    /// The long `timeout-ms` budget is enforced by the session; the HTTP
    /// client only bounds the quick status probes.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        debug!(?config, "from_config: called");
        let raw = config.base_url.trim().trim_end_matches('/');
        let invalid = |reason: String| BackendError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };
        let base = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        let http = Client::builder().build().map_err(BackendError::Unavailable)?;

        Ok(Self {
            base,
            http,
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        })
    }

    /// Endpoint URL under the base; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn probe<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let url = self.url(segments);
        debug!(%url, "probe: called");
        let response = self.http.get(url).timeout(self.probe_timeout).send().await?;
        decode(response).await
    }
}

/// Turn a failure body into the backend's detail text
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Check the status and decode the JSON body
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let detail = extract_detail(&text);
        warn!(status = status.as_u16(), %detail, "decode: backend rejected request");
        return Err(BackendError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        debug!(error = %e, "decode: unexpected body");
        BackendError::InvalidResponse(format!("{}: {}", e, text.chars().take(200).collect::<String>()))
    })
}

/// Check the status and ignore the body
async fn expect_success(response: Response) -> Result<(), BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let text = response.text().await?;
    let detail = extract_detail(&text);
    warn!(status = status.as_u16(), %detail, "expect_success: backend rejected request");
    Err(BackendError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<HealthStatus, BackendError> {
        self.probe(&["health"]).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        self.probe(&["models"]).await
    }

    async fn current_model(&self) -> Result<CurrentModel, BackendError> {
        self.probe(&["models", "current"]).await
    }

    async fn load_model(&self, name: &str) -> Result<(), BackendError> {
        debug!(%name, "load_model: called");
        let url = self.url(&["models", "load", name]);
        let response = self.http.post(url).send().await?;
        expect_success(response).await
    }

    async fn upload_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedDocument, BackendError> {
        debug!(%file_name, size = bytes.len(), "upload_document: called");
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self.http.post(self.url(&["upload"])).multipart(form).send().await?;
        decode(response).await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, BackendError> {
        debug!(
            conversation_id = ?request.conversation_id,
            documents = request.documents.len(),
            has_schema = request.json_schema.is_some(),
            max_tokens = request.max_tokens,
            "generate: called"
        );
        let response = self.http.post(self.url(&["chat"])).json(&request).send().await?;
        decode(response).await
    }

    async fn branch(&self, request: BranchRequest) -> Result<ConversationRecord, BackendError> {
        debug!(conversation_id = %request.conversation_id, branch_point = request.branch_point, "branch: called");
        let response = self
            .http
            .post(self.url(&["conversations", "branch"]))
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, BackendError> {
        self.probe(&["conversations"]).await
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), BackendError> {
        debug!(%id, "delete_conversation: called");
        let url = self.url(&["conversations", id.as_str()]);
        let response = self.http.delete(url).send().await?;
        expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::from_config(&BackendConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let b = backend("http://127.0.0.1:8000/api/");
        assert_eq!(
            b.url(&["models", "current"]).as_str(),
            "http://127.0.0.1:8000/api/models/current"
        );
    }

    #[test]
    fn test_url_encodes_model_names() {
        let b = backend("http://127.0.0.1:8000/api");
        assert_eq!(
            b.url(&["models", "load", "qwen2-7b.Q4_K_M.gguf"]).as_str(),
            "http://127.0.0.1:8000/api/models/load/qwen2-7b.Q4_K_M.gguf"
        );
        assert_eq!(
            b.url(&["models", "load", "my model/v2.gguf"]).as_str(),
            "http://127.0.0.1:8000/api/models/load/my%20model%2Fv2.gguf"
        );
    }

    #[test]
    fn test_malformed_base_url_is_rejected() {
        let result = HttpBackend::from_config(&BackendConfig {
            base_url: "http://".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(BackendError::InvalidUrl { .. })));
    }

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"Failed to load model x.gguf"}"#),
            "Failed to load model x.gguf"
        );
    }

    #[test]
    fn test_extract_detail_structured() {
        let detail = extract_detail(r#"{"detail":[{"loc":["body","message"],"msg":"field required"}]}"#);
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_extract_detail_plain_text() {
        assert_eq!(extract_detail("Internal Server Error\n"), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 9 (discard) is not expected to have an HTTP listener
        let b = backend("http://127.0.0.1:9/api");
        let err = b.health().await.unwrap_err();
        assert!(err.is_unavailable(), "expected network error, got {err:?}");
    }
}
