//! Cloud resource collaborator for the AIOps engine.
//!
//! The engine never talks to a provider SDK directly. Everything goes
//! through the [`CloudApi`] trait, which keeps each capability a thin,
//! single-purpose remote call. [`MockCloud`] is an in-memory provider
//! used by the test suite and by the agent's sandbox mode.

pub mod api;
pub mod error;
pub mod mock;

pub use api::{CloudApi, InstanceSpec};
pub use error::{CloudError, CloudResult};
pub use mock::{MockCloud, RecordedCall};
