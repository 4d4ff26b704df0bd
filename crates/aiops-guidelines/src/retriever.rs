use async_trait::async_trait;

use aiops_protocol::Guideline;

use crate::error::GuidelineResult;

/// Ranked guidance lookup over an operational-guideline corpus.
///
/// Results are ordered by descending confidence and contain at most
/// `top_n` entries.
#[async_trait]
pub trait GuidelineRetriever: Send + Sync {
    async fn search(&self, query: &str, top_n: usize) -> GuidelineResult<Vec<Guideline>>;
}
