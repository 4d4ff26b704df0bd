//! Rule-based inference engine: the fast path.
//!
//! Read-only and diagnostic queries are latency-sensitive and unambiguous
//! enough for keyword matching. Predicates are tried in order and the
//! first hit returns without touching the model.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use aiops_protocol::{IntentCandidate, ResourceKind};

use super::{InferenceEngine, ParseResult};

/// Verbs that change state. Their presence disables the read-only
/// predicates so "stop the hot cpu box" is not answered with a metric.
const MUTATING_VERBS: &[&str] = &[
    "start", "stop", "reboot", "restart", "terminate", "delete", "remove", "destroy", "resize",
    "create", "launch", "make", "snapshot", "kill",
];

/// Verb to action for the verb + native-ID predicate. Longer verbs first.
const VERB_ACTIONS: &[(&str, &str)] = &[
    ("restart", "reboot_instance"),
    ("reboot", "reboot_instance"),
    ("terminate", "terminate_instance"),
    ("delete", "terminate_instance"),
    ("destroy", "terminate_instance"),
    ("resize", "resize_instance"),
    ("snapshot", "create_snapshot"),
    ("backup", "create_snapshot"),
    ("start", "start_instance"),
    ("stop", "stop_instance"),
];

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9_.\-/]+").unwrap());

/// Pattern-matching inference engine.
pub struct RuleBasedEngine;

impl RuleBasedEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RuleBasedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for RuleBasedEngine {
    async fn parse(&self, text: &str) -> Option<ParseResult> {
        route(text).map(|candidate| ParseResult {
            candidate,
            tier: "rules".into(),
        })
    }

    fn tier_name(&self) -> &str {
        "rules"
    }
}

/// Core predicate table.
pub fn route(text: &str) -> Option<IntentCandidate> {
    let lower = text.trim().to_lowercase();
    let words: Vec<&str> = WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().trim_end_matches('.'))
        .collect();
    let has_word = |w: &str| words.contains(&w);
    let mutating = MUTATING_VERBS.iter().any(|v| has_word(*v));

    if !mutating {
        // ── Read-only / diagnostic ──────────────────────────────

        if matches_any(&lower, &["cost", "price", "billing", "spend", "spent", "bill "]) {
            return Some(IntentCandidate::new("get_cost"));
        }

        if matches_any(&lower, &["cpu", "metric", "utilization", "utilisation"]) {
            return Some(IntentCandidate::new("get_metric"));
        }

        if matches_any(&lower, &["topology", "network map", "vpc layout"]) {
            return Some(IntentCandidate::new("list_networks"));
        }

        const LIST_WORDS: [&str; 4] = ["list", "show", "check", "inventory"];
        if LIST_WORDS.iter().any(|w| has_word(*w)) {
            let filter = if has_word("running") {
                "running"
            } else if has_word("stopped") {
                "stopped"
            } else {
                "all"
            };
            return Some(IntentCandidate::new("list_instances").with_arg("filter", filter));
        }
    }

    // ── Verb + native ID ────────────────────────────────────────

    let id = words
        .iter()
        .find(|w| ResourceKind::Instance.matches_native_id(w))?;
    VERB_ACTIONS
        .iter()
        .find(|(verb, _)| has_word(*verb))
        .map(|(_, action)| IntentCandidate::new(*action).with_arg("instance_id", *id))
}

/// Check if the text contains any of the given patterns.
fn matches_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}
