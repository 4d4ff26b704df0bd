//! AWS Bedrock backend over the model-agnostic Converse API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, ConverseOutput, Message};
use tokio::time::timeout;

use super::{LanguageModel, ModelError, ModelResult};
use crate::config::ModelConfig;

/// Configuration for the Bedrock backend.
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    /// Bedrock model ID (e.g., "us.amazon.nova-lite-v1:0").
    pub model_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl From<&ModelConfig> for BedrockConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model_id: config.bedrock_model_id.clone(),
            timeout: config.timeout(),
        }
    }
}

/// Bedrock Converse client.
pub struct BedrockModel {
    client: BedrockClient,
    config: BedrockConfig,
}

impl BedrockModel {
    /// Create a backend with a pre-built Bedrock client.
    pub fn new(client: BedrockClient, config: BedrockConfig) -> Self {
        Self { client, config }
    }

    /// Build a client from the default AWS credential chain, bound to `region`.
    pub async fn from_env(region: &str, config: BedrockConfig) -> Self {
        let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(BedrockClient::new(&aws), config)
    }

    async fn converse(&self, prompt: &str) -> ModelResult<String> {
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.to_string()))
            .build()
            .map_err(|e| ModelError::Request(format!("failed to build message: {e}")))?;

        let response = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .messages(message)
            .send()
            .await
            .map_err(|e| ModelError::Request(format!("bedrock converse error: {e}")))?;

        let output = response
            .output()
            .ok_or_else(|| ModelError::Decode("no output in bedrock response".into()))?;

        let text = match output {
            ConverseOutput::Message(msg) => msg.content().iter().find_map(|block| {
                if let ContentBlock::Text(t) = block {
                    Some(t.clone())
                } else {
                    None
                }
            }),
            _ => None,
        };

        match text {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(ModelError::Empty),
        }
    }
}

#[async_trait]
impl LanguageModel for BedrockModel {
    async fn complete(&self, prompt: &str) -> ModelResult<String> {
        match timeout(self.config.timeout, self.converse(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                secs: self.config.timeout.as_secs(),
            }),
        }
    }

    fn name(&self) -> &str {
        "bedrock"
    }
}
