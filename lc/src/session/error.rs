//! Session error types

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

/// Flat classification of every failure the session can report
///
/// Callers branch on this rather than on the error's text, e.g. to show
/// "service down" (`BackendUnavailable`) differently from "request rejected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    EmptyInput,
    GenerationInProgress,
    NoModelLoaded,
    NoSelection,
    AlreadyLoading,
    InvalidDocument,
    InvalidSchema,
    NoActiveConversation,
    InvalidBranchPoint,
    BackendUnavailable,
    BackendRejected,
    Timeout,
    Cancelled,
}

/// Errors returned by session operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A generation is already in progress")]
    GenerationInProgress,

    #[error("No model loaded")]
    NoModelLoaded,

    #[error("No model selected")]
    NoSelection,

    #[error("A model is already loading")]
    AlreadyLoading,

    #[error("Invalid document '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("Invalid JSON schema: {0}")]
    InvalidSchema(String),

    #[error("No active conversation to branch")]
    NoActiveConversation,

    #[error("Branch point {requested} is outside 1..={available}")]
    InvalidBranchPoint { requested: usize, available: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ChatError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyInput => ErrorKind::EmptyInput,
            ChatError::GenerationInProgress => ErrorKind::GenerationInProgress,
            ChatError::NoModelLoaded => ErrorKind::NoModelLoaded,
            ChatError::NoSelection => ErrorKind::NoSelection,
            ChatError::AlreadyLoading => ErrorKind::AlreadyLoading,
            ChatError::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            ChatError::InvalidSchema(_) => ErrorKind::InvalidSchema,
            ChatError::NoActiveConversation => ErrorKind::NoActiveConversation,
            ChatError::InvalidBranchPoint { .. } => ErrorKind::InvalidBranchPoint,
            ChatError::Timeout(_) => ErrorKind::Timeout,
            ChatError::Cancelled => ErrorKind::Cancelled,
            ChatError::Backend(e) if e.is_unavailable() => ErrorKind::BackendUnavailable,
            ChatError::Backend(_) => ErrorKind::BackendRejected,
        }
    }

    /// True for failures caught locally before any request was sent
    ///
    /// These are usage hints rather than faults.
    pub fn is_guard(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::BackendUnavailable | ErrorKind::BackendRejected | ErrorKind::Timeout | ErrorKind::Cancelled
        )
    }
}

/// Result alias for session operations
pub type ChatResult<T> = Result<T, ChatError>;
