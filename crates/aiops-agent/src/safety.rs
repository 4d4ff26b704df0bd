//! Confirmation checkpoint for disruptive actions.
//!
//! The gate owns the policy (which actions are critical); a
//! `ConfirmationProvider` owns the conversation with a human. The same
//! gate runs under the console REPL, the HTTP surface and the test harness.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{OpsError, OpsResult};
use crate::registry::{ActionRegistry, ActionSpec};

/// Asks a human whether a critical action may proceed.
///
/// Anything other than an explicit yes is a no.
#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    async fn confirm(&self, action: &str, target: &str) -> bool;
}

/// Fixed answer, for non-interactive surfaces and tests. Counts prompts.
pub struct PresetConfirmation {
    answer: bool,
    asked: AtomicUsize,
}

impl PresetConfirmation {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn approve() -> Self {
        Self::new(true)
    }

    pub fn deny() -> Self {
        Self::new(false)
    }

    /// How many times confirmation was requested.
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationProvider for PresetConfirmation {
    async fn confirm(&self, action: &str, target: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(action, target, answer = self.answer, "preset confirmation");
        self.answer
    }
}

/// A pending question for a chat-style front end.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub action: String,
    pub target: String,
    pub respond: oneshot::Sender<bool>,
}

/// Prompt/response over a channel. A dropped responder or a timeout
/// counts as a refusal.
#[derive(Clone)]
pub struct ChannelConfirmation {
    requests: mpsc::Sender<ConfirmationRequest>,
    timeout: Duration,
}

impl ChannelConfirmation {
    /// Returns the provider and the receiving end the front end drains.
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                requests: tx,
                timeout,
            },
            rx,
        )
    }
}

#[async_trait]
impl ConfirmationProvider for ChannelConfirmation {
    async fn confirm(&self, action: &str, target: &str) -> bool {
        let (respond, answer) = oneshot::channel();
        let request = ConfirmationRequest {
            action: action.to_string(),
            target: target.to_string(),
            respond,
        };
        if self.requests.send(request).await.is_err() {
            tracing::warn!(action, "confirmation channel closed");
            return false;
        }
        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!(action, target, "confirmation timed out");
                false
            }
        }
    }
}

/// Whether an operator's reply counts as approval.
pub fn is_affirmative(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case("yes")
}

/// Applies the registry's criticality to a pending dispatch.
pub struct SafetyGate {
    registry: Arc<ActionRegistry>,
}

impl SafetyGate {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn requires_confirmation(&self, action: &str) -> bool {
        self.registry.is_critical(action)
    }

    /// Ask `provider` when `spec` is critical. `target` is the resolved
    /// concrete identifier so the operator sees what will be affected.
    pub async fn check(
        &self,
        spec: &ActionSpec,
        target: &str,
        provider: &dyn ConfirmationProvider,
    ) -> OpsResult<()> {
        if !self.requires_confirmation(spec.name) {
            return Ok(());
        }
        if provider.confirm(spec.name, target).await {
            tracing::info!(action = spec.name, target, "critical action confirmed");
            Ok(())
        } else {
            tracing::info!(action = spec.name, target, "critical action declined");
            Err(OpsError::Aborted {
                action: spec.name.to_string(),
                target: target.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> (SafetyGate, Arc<ActionRegistry>) {
        let registry = Arc::new(ActionRegistry::with_defaults());
        (SafetyGate::new(registry.clone()), registry)
    }

    #[test]
    fn only_yes_is_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("  YES\n"));
        assert!(!is_affirmative("y"));
        assert!(!is_affirmative("yes please"));
        assert!(!is_affirmative(""));
    }

    #[tokio::test]
    async fn critical_action_declined_is_aborted() {
        let (gate, registry) = gate();
        let provider = PresetConfirmation::deny();
        let spec = registry.lookup("terminate_instance").unwrap();

        let err = gate
            .check(spec, "i-0123456789abcdef0", &provider)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OpsError::Aborted {
                action: "terminate_instance".into(),
                target: "i-0123456789abcdef0".into()
            }
        );
        assert_eq!(provider.asked(), 1);
    }

    #[tokio::test]
    async fn non_critical_action_never_asks() {
        let (gate, registry) = gate();
        let provider = PresetConfirmation::deny();
        let spec = registry.lookup("start_instance").unwrap();

        gate.check(spec, "i-0123456789abcdef0", &provider)
            .await
            .unwrap();
        assert_eq!(provider.asked(), 0);
    }

    #[tokio::test]
    async fn channel_round_trip() {
        let (provider, mut requests) = ChannelConfirmation::new(Duration::from_secs(5));
        let responder = tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.action, "stop_instance");
            assert_eq!(request.target, "i-0123456789abcdef0");
            request.respond.send(true).unwrap();
        });

        assert!(provider.confirm("stop_instance", "i-0123456789abcdef0").await);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn channel_dropped_responder_is_no() {
        let (provider, mut requests) = ChannelConfirmation::new(Duration::from_secs(5));
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            drop(request.respond);
        });
        assert!(!provider.confirm("stop_instance", "x").await);
    }

    #[tokio::test(start_paused = true)]
    async fn channel_timeout_is_no() {
        let (provider, mut requests) = ChannelConfirmation::new(Duration::from_secs(30));
        // Hold the request open without answering.
        let holder = tokio::spawn(async move {
            let request = requests.recv().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(request);
        });
        assert!(!provider.confirm("resize_instance", "x").await);
        holder.abort();
    }
}
