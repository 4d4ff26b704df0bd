//! Cloud collaborator error types.

use thiserror::Error;

/// Errors surfaced by a cloud provider. Messages are shown to the
/// operator verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloudError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("{id} is {actual}, operation requires {expected}")]
    InvalidState {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Convenience alias for cloud results.
pub type CloudResult<T> = Result<T, CloudError>;
