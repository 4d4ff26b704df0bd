//! AIOps agent: library crate for the operator path and the remediation loop.
//!
//! Re-exports all modules so the binary and `aiops-e2e-tests` can wire
//! `ChatOps`, `RemediationLoop`, the HTTP router and the model backends
//! together with mock or real collaborators.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod http;
pub mod inference;
pub mod model;
pub mod monitor;
pub mod normalizer;
pub mod ops;
pub mod period;
pub mod registry;
pub mod resolver;
pub mod safety;
