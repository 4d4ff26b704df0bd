//! Operator-facing error taxonomy.
//!
//! `NotFound`, `Ambiguous`, `UnrecognizedIntent` and `Aborted` are
//! expected outcomes rendered to the operator as text. `Validation`
//! names the violated precondition. `External` carries a collaborator's
//! message verbatim.

use aiops_cloud::CloudError;
use aiops_protocol::ResourceKind;
use thiserror::Error;

use crate::resolver::ResolveError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpsError {
    #[error("{}", not_found_message(*kind, query, available))]
    NotFound {
        kind: ResourceKind,
        query: String,
        /// Display names currently available, sorted.
        available: Vec<String>,
    },

    #[error("'{query}' matches more than one {kind}: {}", candidates.join(", "))]
    Ambiguous {
        kind: ResourceKind,
        query: String,
        /// Concrete IDs of every colliding resource.
        candidates: Vec<String>,
    },

    #[error("could not map request to an action: {0}")]
    UnrecognizedIntent(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("external failure: {0}")]
    External(String),

    #[error("{action} on {target} aborted by operator")]
    Aborted { action: String, target: String },
}

fn not_found_message(kind: ResourceKind, query: &str, available: &[String]) -> String {
    let head = if query.is_empty() {
        format!("no {kind} specified")
    } else {
        format!("{kind} '{query}' not found")
    };
    if available.is_empty() {
        head
    } else {
        format!("{head}. Available: {}", available.join(", "))
    }
}

impl OpsError {
    /// Short machine-readable category, reported in HTTP error bodies.
    pub fn category(&self) -> &'static str {
        match self {
            OpsError::NotFound { .. } => "not_found",
            OpsError::Ambiguous { .. } => "ambiguous",
            OpsError::UnrecognizedIntent(_) => "unrecognized_intent",
            OpsError::Validation(_) => "validation",
            OpsError::External(_) => "external",
            OpsError::Aborted { .. } => "aborted",
        }
    }
}

impl From<CloudError> for OpsError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::InvalidState { .. } | CloudError::InvalidArgument(_) => {
                OpsError::Validation(e.to_string())
            }
            other => OpsError::External(other.to_string()),
        }
    }
}

impl From<ResolveError> for OpsError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound {
                kind,
                query,
                available,
            } => OpsError::NotFound {
                kind,
                query,
                available,
            },
            ResolveError::Ambiguous {
                kind,
                query,
                candidates,
            } => OpsError::Ambiguous {
                kind,
                query,
                candidates,
            },
            ResolveError::Cloud(e) => OpsError::from(e),
        }
    }
}

/// Convenience alias for operator-path results.
pub type OpsResult<T> = Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_available_names() {
        let err = OpsError::NotFound {
            kind: ResourceKind::Instance,
            query: "db".into(),
            available: vec!["api".into(), "web".into()],
        };
        assert_eq!(err.to_string(), "instance 'db' not found. Available: api, web");
    }

    #[test]
    fn missing_target_message() {
        let err = OpsError::NotFound {
            kind: ResourceKind::Instance,
            query: String::new(),
            available: vec![],
        };
        assert_eq!(err.to_string(), "no instance specified");
    }

    #[test]
    fn cloud_state_errors_become_validation() {
        let err: OpsError = CloudError::InvalidState {
            id: "i-0abc12345".into(),
            expected: "stopped".into(),
            actual: "running".into(),
        }
        .into();
        assert_eq!(err.category(), "validation");

        let err: OpsError = CloudError::Provider("throttled".into()).into();
        assert_eq!(err, OpsError::External("provider error: throttled".into()));
    }
}
