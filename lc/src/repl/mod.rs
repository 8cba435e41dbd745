//! Interactive REPL for LocalChat
//!
//! Line-edited chat loop over a [`ChatSession`] with slash commands for
//! documents, schemas, models and branching.

mod commands;
mod session;

pub use commands::SlashCommand;
pub use session::{ReplSession, describe_error, format_model_state, print_models};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{info, warn};

use crate::backend::create_backend;
use crate::config::Config;
use crate::session::{ChatSession, SessionOptions};

/// Startup options for `lc chat`
#[derive(Debug, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub attach: Vec<PathBuf>,
    pub schema: Option<PathBuf>,
}

/// Run the interactive REPL
///
/// This is the main entry point for `lc chat`.
pub async fn run_interactive(config: &Config, options: ChatOptions) -> Result<()> {
    let backend = create_backend(&config.backend).map_err(|e| eyre::eyre!("Failed to create backend client: {}", e))?;
    let session = Arc::new(ChatSession::new(backend, SessionOptions::from(config)));

    prepare_session(&session, config, &options).await?;

    let mut repl = ReplSession::new(session);
    repl.run().await
}

/// Apply startup model, attachments and schema to a fresh session
pub async fn prepare_session(session: &ChatSession, config: &Config, options: &ChatOptions) -> Result<()> {
    prepare_model(session, config, options).await;
    apply_context(session, &options.attach, options.schema.as_deref()).await
}

/// Load the requested model, or auto-load one if configured
///
/// Model problems are reported but not fatal: the user can load one from
/// inside the session.
pub async fn prepare_model(session: &ChatSession, config: &Config, options: &ChatOptions) {
    if let Some(name) = options.model.as_deref() {
        if let Err(e) = session.load_model(name).await {
            warn!(%name, error = %e, "prepare_model: requested model failed to load");
            eprintln!("Failed to load model {}: {}", name, e);
        }
    } else if config.chat.auto_load {
        match session.auto_load(config.chat.default_model.as_deref()).await {
            Ok(Some(name)) => info!(%name, "prepare_model: auto-loaded model"),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "prepare_model: auto-load failed");
                eprintln!("Could not prepare a model: {}", e);
            }
        }
    } else if let Err(e) = session.refresh_status().await {
        eprintln!("Backend not reachable: {}", e);
    }
}

/// Attach files and apply a schema file
pub async fn apply_context(session: &ChatSession, attach: &[PathBuf], schema: Option<&Path>) -> Result<()> {
    for path in attach {
        session
            .attach_file(path)
            .await
            .with_context(|| format!("Failed to attach {}", path.display()))?;
    }

    if let Some(path) = schema {
        let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        session
            .apply_schema(&raw)
            .with_context(|| format!("Invalid schema in {}", path.display()))?;
    }

    Ok(())
}
