//! Operational guideline retrieval.
//!
//! Provides the `GuidelineRetriever` abstraction consumed by the
//! remediation loop, a `GuidelineStore` that loads a TOML rule corpus
//! and ranks rules by cosine similarity, and `MockRetriever` for tests.

pub mod error;
pub mod mock;
pub mod retriever;
pub mod store;

pub use error::{GuidelineError, GuidelineResult};
pub use mock::MockRetriever;
pub use retriever::GuidelineRetriever;
pub use store::{GuidelineRule, GuidelineStore};
