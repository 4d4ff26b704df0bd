//! Slack incoming-webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{NotifyError, NotifyResult};
use crate::notifier::Notifier;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts block-formatted messages to a Slack incoming webhook.
///
/// With no webhook configured, messages are written to the local log
/// instead.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> NotifyResult<Self> {
        Self::with_timeout(webhook_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(webhook_url: Option<String>, timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        let webhook_url = webhook_url.filter(|url| !url.trim().is_empty());
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Deliver one message, reporting failures to the caller.
    pub async fn try_send(&self, title: &str, body: &str) -> NotifyResult<()> {
        let Some(url) = &self.webhook_url else {
            tracing::info!(title = %title, "notification skipped, no webhook configured");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&block_payload(title, body))
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, title: &str, body: &str) {
        match self.try_send(title, body).await {
            Ok(()) => tracing::debug!(title = %title, "notification delivered"),
            Err(e) => tracing::warn!(title = %title, error = %e, "notification failed"),
        }
    }
}

/// Header, mrkdwn section, divider.
pub fn block_payload(title: &str, body: &str) -> Value {
    json!({
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": title, "emoji": true }
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": body }
            },
            { "type": "divider" }
        ]
    })
}
