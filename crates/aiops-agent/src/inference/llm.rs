//! Model-backed intent routing.
//!
//! The prompt is generated from the action registry so the model only
//! ever sees names the dispatcher accepts. Whatever the model answers is
//! untrusted text and goes through the extractor.

use std::sync::Arc;

use async_trait::async_trait;

use super::{InferenceEngine, ParseResult};
use crate::extractor;
use crate::model::LanguageModel;
use crate::registry::ActionRegistry;

pub struct LlmEngine {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ActionRegistry>,
}

impl LlmEngine {
    pub fn new(model: Arc<dyn LanguageModel>, registry: Arc<ActionRegistry>) -> Self {
        Self { model, registry }
    }

    pub fn prompt(&self, text: &str) -> String {
        format!(
            "You are an AWS Operations Agent. Map the operator's request to exactly one action.\n\
             \n\
             Available actions (arguments marked ? are optional):\n\
             {vocabulary}\n\
             Use resource names exactly as the operator wrote them.\n\
             Respond ONLY in JSON, no markdown, no explanation:\n\
             {{\"tool\": \"<action name>\", \"args\": {{\"<arg>\": \"<value>\"}}}}\n\
             \n\
             User: {text}",
            vocabulary = self.registry.vocabulary_prompt(),
        )
    }
}

#[async_trait]
impl InferenceEngine for LlmEngine {
    async fn parse(&self, text: &str) -> Option<ParseResult> {
        let raw = match self.model.complete(&self.prompt(text)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(model = self.model.name(), error = %e, "intent model call failed");
                return None;
            }
        };

        match extractor::extract(&raw, &self.registry) {
            Some(candidate) => Some(ParseResult {
                candidate,
                tier: "llm".into(),
            }),
            None => {
                tracing::debug!(raw = %raw, "model output named no known action");
                None
            }
        }
    }

    fn tier_name(&self) -> &str {
        "llm"
    }
}
