//! LocalChat configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main LocalChat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Backend connection settings
    pub backend: BackendConfig,

    /// Per-session chat settings
    pub chat: ChatConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(eyre::eyre!(
                "backend.base-url must be an http(s) URL, got '{}'",
                self.backend.base_url
            ));
        }
        if self.backend.timeout_ms == 0 || self.backend.probe_timeout_ms == 0 {
            return Err(eyre::eyre!("backend timeouts must be greater than zero"));
        }
        if self.chat.max_tokens == 0 {
            return Err(eyre::eyre!("chat.max-tokens must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::fallback_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed: a broken config is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::fallback_paths(),
        };

        paths
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// Project-local `.localchat.yml`, then `~/.config/localchat/localchat.yml`
    fn fallback_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".localchat.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("localchat").join("localchat.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL, including the `/api` prefix
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Budget for generation, model load, upload and branch calls
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Budget for health and model status probes
    #[serde(rename = "probe-timeout-ms")]
    pub probe_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_ms: 300_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Output-length budget sent with every turn
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Model to load at startup when none is loaded
    #[serde(rename = "default-model")]
    pub default_model: Option<String>,

    /// Load a model at REPL start if the backend has none
    #[serde(rename = "auto-load")]
    pub auto_load: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            default_model: None,
            auto_load: true,
        }
    }
}
