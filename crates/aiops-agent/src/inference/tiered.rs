//! Rules first, model second.
//!
//! The deterministic tier answers the common phrasings without a model
//! call; anything it cannot place falls through to the model tier. The
//! tier that produced the result is recorded in `ParseResult.tier`.

use async_trait::async_trait;

use super::{InferenceEngine, ParseResult};

/// Composite engine: local predicates, then the fallback engine.
pub struct TieredEngine {
    local: Box<dyn InferenceEngine>,
    fallback: Box<dyn InferenceEngine>,
}

impl TieredEngine {
    pub fn new(local: Box<dyn InferenceEngine>, fallback: Box<dyn InferenceEngine>) -> Self {
        Self { local, fallback }
    }
}

#[async_trait]
impl InferenceEngine for TieredEngine {
    async fn parse(&self, text: &str) -> Option<ParseResult> {
        if let Some(result) = self.local.parse(text).await {
            return Some(result);
        }

        tracing::debug!(
            fallback = self.fallback.tier_name(),
            "{} tier missed, falling back",
            self.local.tier_name()
        );
        self.fallback.parse(text).await
    }

    fn tier_name(&self) -> &str {
        "tiered"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use aiops_protocol::IntentCandidate;

    /// Engine returning a fixed result and counting calls.
    struct MockEngine {
        result: Option<ParseResult>,
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl MockEngine {
        fn hit(name: &'static str, action: &str) -> Self {
            Self {
                result: Some(ParseResult {
                    candidate: IntentCandidate::new(action),
                    tier: name.into(),
                }),
                name,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn miss(name: &'static str) -> Self {
            Self {
                result: None,
                name,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl InferenceEngine for MockEngine {
        async fn parse(&self, _text: &str) -> Option<ParseResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn tier_name(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn local_hit_skips_fallback() {
        let fallback = MockEngine::hit("llm", "list_instances");
        let fallback_calls = fallback.calls.clone();
        let engine = TieredEngine::new(
            Box::new(MockEngine::hit("rules", "list_instances")),
            Box::new(fallback),
        );

        let result = engine.parse("list instances").await.unwrap();
        assert_eq!(result.tier, "rules");
        assert_eq!(result.candidate.action, "list_instances");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_on_local_miss() {
        let engine = TieredEngine::new(
            Box::new(MockEngine::miss("rules")),
            Box::new(MockEngine::hit("llm", "create_network")),
        );

        let result = engine.parse("build me a vpc").await.unwrap();
        assert_eq!(result.tier, "llm");
        assert_eq!(result.candidate.action, "create_network");
    }

    #[tokio::test]
    async fn both_miss_returns_none() {
        let engine = TieredEngine::new(
            Box::new(MockEngine::miss("rules")),
            Box::new(MockEngine::miss("llm")),
        );

        assert!(engine.parse("hello world").await.is_none());
    }
}
