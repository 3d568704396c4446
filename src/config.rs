//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the path given on the command line (`--config`)
//! 2. `$MAILDIGEST_CONFIG` (environment variable)
//! 3. `./maildigest.toml`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MailDigestError, Result};

pub const CONFIG_ENV_VAR: &str = "MAILDIGEST_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "maildigest.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    /// Where emails are read from.
    pub ingest: IngestConfig,
    /// Where summaries are written.
    pub output: OutputConfig,
    /// Generative model backend.
    pub model: ModelConfig,
    /// Truncation and generation bounds.
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Folder scanned for message files.
    pub email_dir: PathBuf,
    /// Recognized file extensions, matched case-insensitively.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Indent the JSON output.
    pub pretty: bool,
}

/// Generative model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// "none", "openai" or "openrouter".
    pub provider: String,
    /// Completion model identifier at the provider.
    pub model: String,
    /// Embedding model identifier; unset disables embeddings.
    pub embedding_model: Option<String>,
    pub temperature: f64,
    /// Wall-clock budget for one generation call.
    pub timeout_secs: u64,
}

/// Truncation and generation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Characters of text kept before the task prefix is added.
    pub max_input_chars: usize,
    /// Hard cap on the tokenized input, end-of-sequence marker included.
    pub max_input_tokens: usize,
    pub email_min_length: usize,
    pub email_max_length: usize,
    pub document_min_length: usize,
    pub document_max_length: usize,
    pub num_beams: usize,
    pub length_penalty: f64,
    /// Wall-clock budget for one attachment extraction.
    pub extraction_timeout_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            email_dir: PathBuf::from("emails"),
            extensions: vec![".eml".to_string(), ".msg".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            pretty: true,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: None,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 900,
            max_input_tokens: 512,
            email_min_length: 40,
            email_max_length: 150,
            document_min_length: 20,
            document_max_length: 100,
            num_beams: 4,
            length_penalty: 2.0,
            extraction_timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LimitsConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

// ── Load ────────────────────────────────────────────────────────

impl Config {
    /// Parse one TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MailDigestError::io(path, e))?;
        toml::from_str(&contents)
            .map_err(|e| MailDigestError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Where the configuration came from.
#[derive(Debug)]
pub enum ConfigSource {
    /// No file was found
    Defaults,
    File(PathBuf),
    /// A file was found but could not be read or parsed
    Invalid { path: PathBuf, error: MailDigestError },
}

impl ConfigSource {
    /// Report the outcome; call once tracing is installed.
    pub fn log(&self) {
        match self {
            ConfigSource::Defaults => tracing::debug!("No config file found, using defaults"),
            ConfigSource::File(path) => tracing::info!(path = %path.display(), "Loaded config"),
            ConfigSource::Invalid { path, error } => tracing::warn!(
                path = %path.display(),
                error = %error,
                "Failed to load config, using defaults"
            ),
        }
    }
}

/// Find and read the configuration without logging, so the caller can set
/// up tracing from the result first.
pub fn resolve_config(explicit: Option<&Path>) -> (Config, ConfigSource) {
    let Some(path) = config_file_path(explicit) else {
        return (Config::default(), ConfigSource::Defaults);
    };

    match Config::from_file(&path) {
        Ok(cfg) => (cfg, ConfigSource::File(path)),
        Err(error) => (Config::default(), ConfigSource::Invalid { path, error }),
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let (config, source) = resolve_config(explicit);
    source.log();
    config
}

/// Determine the config file path. An explicit path or the environment
/// override is returned even when it does not exist, so that a typo is
/// reported instead of silently ignored.
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}
