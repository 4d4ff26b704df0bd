//! Scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LanguageModel, ModelError, ModelResult};

/// Replays queued responses in order; the last one repeats once the
/// queue is down to a single entry. Every prompt is recorded.
pub struct MockModel {
    responses: Mutex<VecDeque<ModelResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new(responses: Vec<ModelResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    /// Always fail as if the backend were unreachable.
    pub fn failing() -> Self {
        Self::new(vec![Err(ModelError::Request("connection refused".into()))])
    }

    /// Prompts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str) -> ModelResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let mut queue = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Err(ModelError::Empty))
        } else {
            queue.front().cloned().unwrap_or(Err(ModelError::Empty))
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
