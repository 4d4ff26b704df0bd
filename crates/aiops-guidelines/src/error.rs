//! Guideline retrieval error types.

use thiserror::Error;

/// Errors that can occur while loading or searching the guideline corpus.
#[derive(Debug, Error)]
pub enum GuidelineError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid guideline corpus {path}: {message}")]
    Parse { path: String, message: String },

    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

/// Convenience alias for guideline results.
pub type GuidelineResult<T> = Result<T, GuidelineError>;
