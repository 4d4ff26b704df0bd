//! Notification error types.

use thiserror::Error;

/// Errors from a delivery attempt. Logged by the notifier, never
/// propagated past `Notifier::send`.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(String),

    #[error("webhook rejected message: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Convenience alias for notification results.
pub type NotifyResult<T> = Result<T, NotifyError>;
