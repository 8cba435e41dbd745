//! Output-schema constraint

use serde_json::Value;
use tracing::debug;

use super::error::{ChatError, ChatResult};

/// What `apply` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    Applied,
    Cleared,
}

/// Holds at most one output schema
///
/// A stored value is always a fully parsed JSON object. A failed `apply`
/// leaves the previous schema in place.
#[derive(Debug, Default)]
pub struct SchemaController {
    current: Option<Value>,
}

impl SchemaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the schema from user-entered text; blank text clears it
    pub fn apply(&mut self, raw: &str) -> ChatResult<SchemaOutcome> {
        debug!(raw_len = raw.len(), "apply: called");
        if raw.trim().is_empty() {
            self.clear();
            return Ok(SchemaOutcome::Cleared);
        }

        let parsed: Value = serde_json::from_str(raw).map_err(|e| ChatError::InvalidSchema(e.to_string()))?;
        if !parsed.is_object() {
            return Err(ChatError::InvalidSchema("schema must be a JSON object".to_string()));
        }

        self.current = Some(parsed);
        Ok(SchemaOutcome::Applied)
    }

    pub fn clear(&mut self) {
        debug!("clear: called");
        self.current = None;
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }
}
