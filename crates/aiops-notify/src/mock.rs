//! Mock notifier for testing: records every message.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::notifier::Notifier;

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub title: String,
    pub body: String,
}

/// Mock implementation of the `Notifier` trait.
pub struct MockNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    /// All messages sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn reset(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, title: &str, body: &str) {
        self.sent.lock().unwrap().push(SentMessage {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_messages() {
        let notifier = MockNotifier::new();
        notifier.send("Service Outage", "AIOpsmake stopped").await;
        notifier.send("Latency Risk", "batch-worker hot").await;

        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(notifier.last_sent().unwrap().title, "Latency Risk");
        notifier.reset();
        assert!(notifier.sent().is_empty());
    }
}
