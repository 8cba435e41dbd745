//! Backend error types

use thiserror::Error;

/// Errors that can occur while talking to the generation backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached at all (connect refused, DNS, dropped body)
    #[error("Backend unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The configured base URL cannot address endpoints
    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The backend answered success with a body this client cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Check if this is a network-level failure rather than a backend verdict
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }

    /// The backend's own detail text, when it reported one
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Rejected { detail, .. } => Some(detail),
            _ => None,
        }
    }
}
