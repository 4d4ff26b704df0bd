//! Incident notifications for the AIOps agent.
//!
//! - `Notifier` trait: best-effort `send(title, body)`, never fails the caller
//! - `SlackNotifier`: Slack incoming-webhook delivery with block layout
//! - `MockNotifier`: records messages for assertions in tests

pub mod error;
pub mod mock;
pub mod notifier;
pub mod slack;

pub use error::{NotifyError, NotifyResult};
pub use mock::{MockNotifier, SentMessage};
pub use notifier::Notifier;
pub use slack::SlackNotifier;
