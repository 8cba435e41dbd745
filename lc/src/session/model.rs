//! Model lifecycle
//!
//! ```text
//! NoModel ──load──► Loading ──ok──► Loaded(name) ──load──► Loading
//!                      │                 │
//!                      └──fail──► Error  └──probe: none──► NoModel
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{ChatError, ChatResult};
use super::events::{EventSink, SessionEvent};
use super::lock;
use crate::backend::{Backend, BackendError};

/// Backend model state as last observed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelState {
    #[default]
    NoModel,
    Loading { name: String },
    Loaded { name: String },
    Error { detail: String },
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ModelState::Loading { .. })
    }

    pub fn loaded_name(&self) -> Option<&str> {
        match self {
            ModelState::Loaded { name } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::NoModel => write!(f, "No model loaded"),
            ModelState::Loading { name } => write!(f, "Loading model {}...", name),
            ModelState::Loaded { name } => write!(f, "Model: {}", name),
            ModelState::Error { detail } => write!(f, "Error loading model: {}", detail),
        }
    }
}

/// Tracks and drives the backend's loaded model
pub struct ModelCoordinator {
    backend: Arc<dyn Backend>,
    state: Mutex<ModelState>,
    timeout: Duration,
    events: EventSink,
}

impl ModelCoordinator {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration, events: EventSink) -> Self {
        Self {
            backend,
            state: Mutex::new(ModelState::NoModel),
            timeout,
            events,
        }
    }

    pub fn state(&self) -> ModelState {
        lock(&self.state).clone()
    }

    fn set_state(&self, next: ModelState) {
        let changed = {
            let mut state = lock(&self.state);
            if *state == next {
                false
            } else {
                debug!(from = ?*state, to = ?next, "set_state: transition");
                *state = next.clone();
                true
            }
        };
        if changed {
            self.events.emit(SessionEvent::ModelStateChanged { state: next });
        }
    }

    /// Load `name` on the backend
    ///
    /// Rejects a second load while one is running. On failure the state
    /// becomes `Error` carrying the backend's detail text.
    pub async fn load_model(&self, name: &str) -> ChatResult<()> {
        debug!(%name, "load_model: called");
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::NoSelection);
        }

        {
            let mut state = lock(&self.state);
            if state.is_loading() {
                debug!("load_model: already loading");
                return Err(ChatError::AlreadyLoading);
            }
            *state = ModelState::Loading { name: name.to_string() };
        }
        self.events.emit(SessionEvent::ModelStateChanged {
            state: ModelState::Loading { name: name.to_string() },
        });

        let mut guard = LoadingGuard {
            coordinator: self,
            armed: true,
        };

        let result = tokio::time::timeout(self.timeout, self.backend.load_model(name)).await;
        guard.armed = false;

        match result {
            Ok(Ok(())) => {
                info!(%name, "load_model: loaded");
                self.set_state(ModelState::Loaded { name: name.to_string() });
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(%name, error = %e, "load_model: backend failed");
                self.set_state(ModelState::Error {
                    detail: e.detail().map(str::to_string).unwrap_or_else(|| e.to_string()),
                });
                Err(ChatError::Backend(e))
            }
            Err(_) => {
                warn!(%name, timeout = ?self.timeout, "load_model: timed out");
                self.set_state(ModelState::Error {
                    detail: format!("timed out after {:?}", self.timeout),
                });
                Err(ChatError::Timeout(self.timeout))
            }
        }
    }

    /// Reconcile local state with the backend's
    ///
    /// Safe to call at any time. A local load in progress is kept as
    /// `Loading`, and a local `Error` survives a probe reporting no model.
    pub async fn refresh_status(&self) -> Result<ModelState, BackendError> {
        debug!("refresh_status: called");
        let current = self.backend.current_model().await?;

        let next = {
            let state = lock(&self.state);
            match (current.loaded, current.name) {
                _ if state.is_loading() => state.clone(),
                (true, Some(name)) => ModelState::Loaded { name },
                (true, None) => ModelState::Loaded {
                    name: state.loaded_name().unwrap_or("unknown").to_string(),
                },
                (false, _) => match &*state {
                    ModelState::Error { .. } => state.clone(),
                    _ => ModelState::NoModel,
                },
            }
        };

        self.set_state(next.clone());
        Ok(next)
    }
}

/// Marks an interrupted load as failed so the state never sticks at `Loading`
struct LoadingGuard<'a> {
    coordinator: &'a ModelCoordinator,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("LoadingGuard::drop: load abandoned");
            self.coordinator.set_state(ModelState::Error {
                detail: "load interrupted".to_string(),
            });
        }
    }
}
