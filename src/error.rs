use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside the pipeline.
///
/// None of these cross the public boundaries that promise a value
/// (`SummaryEngine::summarize`, `MailDigest::process_email`, the extractors'
/// dispatch); they are logged there and replaced with the documented fallback.
#[derive(Error, Debug)]
pub enum MailDigestError {
    #[error("IO error for '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Parse error: {0} - The message structure may be invalid")]
    Parse(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Model error: {0} - Please check your model configuration")]
    Model(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MailDigestError {
    /// Attach a path to a bare IO error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MailDigestError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<io::Error> for MailDigestError {
    fn from(error: io::Error) -> Self {
        MailDigestError::Io {
            path: PathBuf::new(),
            source: error,
        }
    }
}

pub type Result<T> = std::result::Result<T, MailDigestError>;
