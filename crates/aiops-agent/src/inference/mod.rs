//! Operator intent routing.
//!
//! Converts operator text ("stop web-server", "what did we spend in Q2")
//! into an `IntentCandidate` naming a registered action.
//!
//! Two tiers:
//! - **Rule-based** (fast path): deterministic keyword predicates, no model call.
//! - **LLM**: registry-derived prompt sent to the generative model, output run
//!   through the extractor.

pub mod llm;
pub mod rules;
pub mod tiered;

use async_trait::async_trait;

use aiops_protocol::IntentCandidate;

/// A routed intent and the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub candidate: IntentCandidate,
    pub tier: String,
}

/// Trait for inference engines that map natural language to an action.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Returns None if the engine cannot map the input.
    async fn parse(&self, text: &str) -> Option<ParseResult>;

    /// Name of this inference tier (for logging/audit).
    fn tier_name(&self) -> &str;
}

pub use llm::LlmEngine;
pub use rules::RuleBasedEngine;
pub use tiered::TieredEngine;
