//! Conversation session core
//!
//! Everything between a user composing a message and the backend answering:
//! attached documents, the output schema, model state, conversation identity
//! and the single-flight rule that ties them together.
//!
//! [`ChatSession`] is the entry point. It owns one of each component and is
//! the only thing that talks to the backend on the user's behalf.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

mod conversation;
mod documents;
mod error;
mod events;
mod flight;
mod model;
mod orchestrator;
mod schema;

pub use conversation::{BranchRecord, ConversationManager, Role, Turn};
pub use documents::{DocumentContext, DocumentSet};
pub use error::{ChatError, ChatResult, ErrorKind};
pub use events::{EventSink, SessionEvent};
pub use flight::{Activity, FlightGate, FlightTicket};
pub use model::{ModelCoordinator, ModelState};
pub use orchestrator::{ChatSession, SessionOptions, TurnReply};
pub use schema::{SchemaController, SchemaOutcome};

use crate::backend::BackendError;

/// Lock a mutex, recovering the data if a holder panicked
///
/// Critical sections in this module never await and never leave state
/// half-written, so a poisoned lock still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a backend call under a time budget and a cancellation token
pub(crate) async fn bounded<T, F>(call: F, timeout: Duration, cancel: &CancellationToken) -> ChatResult<T>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(inner) => inner.map_err(ChatError::from),
            Err(_) => Err(ChatError::Timeout(timeout)),
        },
    }
}
