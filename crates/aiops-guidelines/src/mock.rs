//! Mock retriever for testing: serves canned guidance and records queries.

use std::sync::Mutex;

use async_trait::async_trait;

use aiops_protocol::Guideline;

use crate::error::{GuidelineError, GuidelineResult};
use crate::retriever::GuidelineRetriever;

/// A retriever returning a fixed result list.
pub struct MockRetriever {
    guidelines: Vec<Guideline>,
    failure: Option<String>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockRetriever {
    pub fn new(guidelines: Vec<Guideline>) -> Self {
        Self {
            guidelines,
            failure: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A retriever whose every search fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            guidelines: Vec::new(),
            failure: Some(message.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A retriever holding one generic guideline.
    pub fn with_sample() -> Self {
        Self::new(vec![Guideline {
            id: "instance_stopped".into(),
            text: "Start stopped production instances after checking the last shutdown reason"
                .into(),
            confidence: 0.82,
        }])
    }

    /// All `(query, top_n)` pairs searched so far.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for MockRetriever {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl GuidelineRetriever for MockRetriever {
    async fn search(&self, query: &str, top_n: usize) -> GuidelineResult<Vec<Guideline>> {
        self.queries.lock().unwrap().push((query.to_string(), top_n));
        if let Some(message) = &self.failure {
            return Err(GuidelineError::Retrieval(message.clone()));
        }
        Ok(self.guidelines.iter().take(top_n).cloned().collect())
    }
}
