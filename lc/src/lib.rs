//! LocalChat - conversation client for a locally hosted generation backend
//!
//! LocalChat drives chat sessions against an offline model server: it loads a
//! model, keeps the conversation identity the backend hands out, attaches
//! uploaded documents and an optional output schema to every turn, and can
//! branch a conversation into a new lineage at an earlier point.
//!
//! # Core Concepts
//!
//! - **Backend Owns Truth**: model state is probed, conversation ids are adopted, never invented
//! - **Single Flight**: one outstanding backend operation per session; extras are rejected
//! - **Snapshots**: a request sees documents and schema as they were when it was composed
//! - **Bounded Calls**: every call has a timeout and can be cancelled
//!
//! # Modules
//!
//! - [`backend`] - Backend trait and HTTP implementation
//! - [`session`] - Documents, schema, model lifecycle, conversation and turn orchestration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`repl`] - Interactive chat loop

pub mod backend;
pub mod cli;
pub mod config;
pub mod repl;
pub mod session;

// Re-export commonly used types
pub use backend::{Backend, BackendError, ConversationId, DocumentId, HttpBackend, create_backend};
pub use config::Config;
pub use session::{
    ChatError, ChatResult, ChatSession, DocumentContext, ErrorKind, ModelState, SchemaOutcome, SessionEvent,
    SessionOptions, TurnReply,
};
