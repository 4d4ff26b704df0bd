//! Generative-model backends.
//!
//! The engine treats the model as a black box: prompt in, text out.
//! Backends impose their own per-call timeout and report failures as
//! `ModelError`; callers decide how to degrade.

pub mod bedrock;
pub mod mock;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ModelBackend, ModelConfig};

/// Errors from a model call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable model response: {0}")]
    Decode(String),

    #[error("model returned no text")]
    Empty,

    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("model client setup failed: {0}")]
    Client(String),
}

/// Convenience alias for model results.
pub type ModelResult<T> = Result<T, ModelError>;

/// Text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> ModelResult<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

pub use bedrock::{BedrockConfig, BedrockModel};
pub use mock::MockModel;
pub use ollama::{OllamaConfig, OllamaModel};

/// Build the configured backend. Bedrock runs in `region`.
pub async fn build_model(
    config: &ModelConfig,
    region: &str,
) -> ModelResult<Arc<dyn LanguageModel>> {
    match config.backend {
        ModelBackend::Ollama => {
            let model = OllamaModel::new(OllamaConfig::from(config))?;
            tracing::info!(host = %config.host, model = %config.model, "using ollama backend");
            Ok(Arc::new(model))
        }
        ModelBackend::Bedrock => {
            let model = BedrockModel::from_env(region, BedrockConfig::from(config)).await;
            tracing::info!(model_id = %config.bedrock_model_id, region, "using bedrock backend");
            Ok(Arc::new(model))
        }
    }
}
