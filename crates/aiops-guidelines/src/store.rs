//! In-process guideline corpus with cosine-similarity ranking.
//!
//! The corpus is a TOML file of rules keyed by ID:
//!
//! ```toml
//! [rules.instance_stopped]
//! description = "A production instance found stopped should be started ..."
//! severity = "critical"
//! action_type = "START_INSTANCE"
//! ```
//!
//! Each rule's description is indexed as a term-frequency vector. A query
//! is scored against every rule with cosine similarity; the distance is
//! `1 - similarity` and confidence is derived from it the same way for
//! any backend.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use aiops_protocol::Guideline;

use crate::error::{GuidelineError, GuidelineResult};
use crate::retriever::GuidelineRetriever;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

/// One rule of the guideline corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidelineRule {
    pub id: String,
    pub description: String,
    pub severity: Option<String>,
    pub action_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    rules: BTreeMap<String, RuleBody>,
}

#[derive(Debug, Deserialize)]
struct RuleBody {
    description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    action_type: Option<String>,
}

struct IndexedRule {
    rule: GuidelineRule,
    terms: HashMap<String, f64>,
    norm: f64,
}

/// Guideline corpus held in memory.
pub struct GuidelineStore {
    rules: Vec<IndexedRule>,
}

impl GuidelineStore {
    pub fn from_rules(rules: Vec<GuidelineRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let terms = term_frequencies(&rule.description);
                let norm = vector_norm(&terms);
                IndexedRule { rule, terms, norm }
            })
            .collect();
        Self { rules }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parse a TOML corpus. `source` names the origin in error messages.
    pub fn from_toml_str(text: &str, source: &str) -> GuidelineResult<Self> {
        let file: CorpusFile = toml::from_str(text).map_err(|e| GuidelineError::Parse {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        let rules = file
            .rules
            .into_iter()
            .map(|(id, body)| GuidelineRule {
                id,
                description: body.description,
                severity: body.severity,
                action_type: body.action_type,
            })
            .collect();
        Ok(Self::from_rules(rules))
    }

    /// Load a corpus file. A missing file yields an empty corpus.
    pub async fn load(path: impl AsRef<Path>) -> GuidelineResult<Self> {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "guideline corpus not found, retrieval disabled");
                return Ok(Self::empty());
            }
            Err(e) => return Err(GuidelineError::Io(format!("{}: {e}", path.display()))),
        };
        let store = Self::from_toml_str(&text, &path.display().to_string())?;
        tracing::info!(path = %path.display(), rules = store.len(), "loaded guideline corpus");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: &str) -> Option<&GuidelineRule> {
        self.rules.iter().map(|r| &r.rule).find(|r| r.id == id)
    }

    /// Rank every rule against `query`; highest confidence first, ties by ID.
    pub fn rank(&self, query: &str, top_n: usize) -> Vec<Guideline> {
        let query_terms = term_frequencies(query);
        let query_norm = vector_norm(&query_terms);

        let mut scored: Vec<(f64, &GuidelineRule)> = self
            .rules
            .iter()
            .map(|indexed| {
                let similarity = cosine(&query_terms, query_norm, &indexed.terms, indexed.norm);
                (1.0 - similarity, &indexed.rule)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        scored
            .into_iter()
            .take(top_n)
            .map(|(distance, rule)| Guideline {
                id: rule.id.clone(),
                text: render(rule),
                confidence: Guideline::confidence_from_distance(distance),
            })
            .collect()
    }
}

#[async_trait]
impl GuidelineRetriever for GuidelineStore {
    async fn search(&self, query: &str, top_n: usize) -> GuidelineResult<Vec<Guideline>> {
        Ok(self.rank(query, top_n))
    }
}

fn render(rule: &GuidelineRule) -> String {
    match &rule.action_type {
        Some(action) => format!("{} (recommended: {action})", rule.description),
        None => rule.description.clone(),
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let lowered = text.to_lowercase();
    let mut terms = HashMap::new();
    for token in TOKEN_RE.find_iter(&lowered) {
        *terms.entry(token.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    terms
}

fn vector_norm(terms: &HashMap<String, f64>) -> f64 {
    terms.values().map(|v| v * v).sum::<f64>().sqrt()
}

fn cosine(a: &HashMap<String, f64>, a_norm: f64, b: &HashMap<String, f64>, b_norm: f64) -> f64 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum();
    dot / (a_norm * b_norm)
}
