//! Document context aggregation
//!
//! Holds the documents attached to the current composition, in attach order.
//! The orchestrator only ever sees an owned copy of their contents.

use tracing::debug;

use super::error::{ChatError, ChatResult};
use crate::backend::DocumentId;

/// One attached document; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub id: DocumentId,
    pub display_name: String,
    pub content: String,
}

/// Ordered set of attached documents keyed by id
#[derive(Debug, Default)]
pub struct DocumentSet {
    docs: Vec<DocumentContext>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a document
    ///
    /// Returns `Ok(false)` when a document with this id is already attached.
    /// Blank content is rejected.
    pub fn add(
        &mut self,
        id: DocumentId,
        display_name: impl Into<String>,
        content: impl Into<String>,
    ) -> ChatResult<bool> {
        let display_name = display_name.into();
        let content = content.into();
        debug!(%id, %display_name, content_len = content.len(), "add: called");

        if content.trim().is_empty() {
            return Err(ChatError::InvalidDocument {
                name: display_name,
                reason: "no extractable content".to_string(),
            });
        }

        if self.contains(&id) {
            debug!(%id, "add: already attached");
            return Ok(false);
        }

        self.docs.push(DocumentContext {
            id,
            display_name,
            content,
        });
        Ok(true)
    }

    /// Detach a document; absent ids are ignored
    pub fn remove(&mut self, id: &DocumentId) -> Option<DocumentContext> {
        debug!(%id, "remove: called");
        let idx = self.docs.iter().position(|d| &d.id == id)?;
        Some(self.docs.remove(idx))
    }

    /// Contents in attach order, as an owned copy
    pub fn snapshot_contents(&self) -> Vec<String> {
        self.docs.iter().map(|d| d.content.clone()).collect()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.docs.iter().any(|d| &d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentContext> {
        self.docs.iter()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
