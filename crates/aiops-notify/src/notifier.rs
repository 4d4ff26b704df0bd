use async_trait::async_trait;

/// Outbound notification channel.
///
/// Delivery is best-effort: implementations log failures and return
/// normally so a broken webhook never aborts a remediation tick.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, body: &str);
}
