//! Structured intent extraction from free-form model output.
//!
//! Models wrap JSON in prose and markdown fences, use Python-literal
//! quoting, or skip JSON entirely. Extraction tries, in order:
//!
//! 1. strict JSON on the outermost brace-delimited substring
//! 2. a loose rewrite of that substring (single quotes, `True`/`None`,
//!    bare keys, trailing commas) parsed again as JSON
//! 3. a keyword scan with a per-sentence negation guard
//!
//! `None` means no strategy recognized an action; callers defer to their
//! fallback instead of failing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use aiops_protocol::{IntentCandidate, RemediationAction, RemediationDecision};

use crate::registry::ActionRegistry;

const ACTION_KEYS: &[&str] = &["action", "tool", "tool_name", "function"];
const ARGS_KEYS: &[&str] = &["args", "tool_args", "parameters", "arguments", "params"];

static NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:not|never|cannot|can'?t|don'?t|doesn'?t|shouldn'?t|won'?t|avoid)\b")
        .unwrap()
});

static SENTENCE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?;\n]+").unwrap());

/// Decision keywords, checked in this order within a sentence.
///
/// Bounded by non-letters rather than `\b` so that label forms such as
/// `REBOOT_INSTANCE` or `ADVISE_SCALE_UP` match on their parts.
static DECISION_KEYWORDS: LazyLock<Vec<(RemediationAction, Regex)>> = LazyLock::new(|| {
    [
        (RemediationAction::Reboot, r"reboot(?:ing)?|restart(?:ing)?"),
        (RemediationAction::Start, r"start(?:ing)?|boot|begin|launch"),
        (
            RemediationAction::AdviseScaleUp,
            r"scale(?:[ _-]?up)?|upgrade|increase|resize",
        ),
        (RemediationAction::ManualCheck, r"manual(?:ly)?|check|investigate|review"),
    ]
    .into_iter()
    .map(|(action, words)| {
        let pattern = format!(r"(?i)(?:^|[^a-z])({words})(?:[^a-z]|$)");
        (action, Regex::new(&pattern).unwrap())
    })
    .collect()
});

// ── Operator intent ───────────────────────────────────────────

/// Extract an operator intent whose action is in `registry`.
///
/// The returned candidate carries the canonical action name.
pub fn extract(text: &str, registry: &ActionRegistry) -> Option<IntentCandidate> {
    if let Some(object) = parse_object(text) {
        if let Some(name) = string_field(&object, ACTION_KEYS) {
            if let Some(spec) = registry.lookup(&name) {
                let mut candidate = IntentCandidate::new(spec.name);
                candidate.args = args_field(&object);
                return Some(candidate);
            }
            tracing::debug!(action = %name, "model named an unrecognized action");
        }
    }

    scan_for_action(text, registry)
}

fn scan_for_action(text: &str, registry: &ActionRegistry) -> Option<IntentCandidate> {
    let mut best: Option<(usize, &str)> = None;
    for sentence in sentences(text) {
        if NEGATION_RE.is_match(sentence.text) {
            continue;
        }
        let lower = sentence.text.to_ascii_lowercase();
        for (word, canonical) in registry.vocabulary() {
            if let Some(pos) = find_word(&lower, word) {
                let at = sentence.offset + pos;
                if best.is_none_or(|(b, _)| at < b) {
                    best = Some((at, canonical));
                }
            }
        }
    }
    best.map(|(_, canonical)| IntentCandidate::new(canonical))
}

/// Position of `word` in `haystack` bounded by non-identifier characters.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    haystack.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

// ── Remediation decision ──────────────────────────────────────

/// Extract a remediation decision.
///
/// An explicit `NONE` action is a valid decision and is returned as such.
pub fn extract_decision(text: &str) -> Option<RemediationDecision> {
    if let Some(object) = parse_object(text) {
        if let Some(label) = string_field(&object, &["action", "decision", "tool"]) {
            if let Some(action) = RemediationAction::from_label(&label) {
                return Some(RemediationDecision {
                    action,
                    root_cause: string_field(&object, &["root_cause", "cause"]).unwrap_or_default(),
                    reason: string_field(&object, &["reason", "rationale"]).unwrap_or_default(),
                });
            }
            tracing::debug!(label = %label, "unrecognized decision label, scanning text");
        }
    }

    scan_for_decision(text)
}

fn scan_for_decision(text: &str) -> Option<RemediationDecision> {
    for sentence in sentences(text) {
        if NEGATION_RE.is_match(sentence.text) {
            continue;
        }
        for (action, pattern) in DECISION_KEYWORDS.iter() {
            if let Some(hit) = pattern.captures(sentence.text).and_then(|c| c.get(1)) {
                return Some(RemediationDecision {
                    action: *action,
                    root_cause: "model response was not structured".into(),
                    reason: format!("keyword '{}' in: {}", hit.as_str(), sentence.text.trim()),
                });
            }
        }
    }
    None
}

// ── Shared parsing ────────────────────────────────────────────

struct Sentence<'a> {
    text: &'a str,
    offset: usize,
}

fn sentences(text: &str) -> impl Iterator<Item = Sentence<'_>> {
    let mut start = 0;
    let mut parts = Vec::new();
    for m in SENTENCE_SPLIT_RE.find_iter(text) {
        parts.push(Sentence {
            text: &text[start..m.start()],
            offset: start,
        });
        start = m.end();
    }
    parts.push(Sentence {
        text: &text[start..],
        offset: start,
    });
    parts.into_iter().filter(|s| !s.text.trim().is_empty())
}

/// Strip a markdown code fence if one is present.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                return after[..end].trim();
            }
        }
    }
    trimmed
}

/// Outermost `{ ... }` span: first opening brace to last closing brace.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let span = brace_span(strip_fences(text)).or_else(|| brace_span(text))?;
    let value = serde_json::from_str::<Value>(span)
        .or_else(|_| serde_json::from_str::<Value>(&loosen(span)))
        .ok()?;
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

fn args_field(object: &Map<String, Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(args)) = ARGS_KEYS.iter().find_map(|k| object.get(*k)) else {
        return BTreeMap::new();
    };
    args.iter()
        .filter_map(|(k, v)| {
            let text = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Array(items) if items.len() == 1 => match &items[0] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                other => other.to_string(),
            };
            (!text.trim().is_empty()).then(|| (k.clone(), text))
        })
        .collect()
}

/// Rewrite a Python-literal-ish object into JSON.
fn loosen(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 16);
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('"');
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                if escaped != '\'' {
                                    out.push('\\');
                                }
                                out.push(escaped);
                            }
                        }
                        ch if ch == c => break,
                        '"' => out.push_str("\\\""),
                        ch => out.push(ch),
                    }
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || matches!(next, '_' | '-' | '.') {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" | "true" => out.push_str("true"),
                    "False" | "false" => out.push_str("false"),
                    "None" | "null" => out.push_str("null"),
                    _ => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                }
            }
            ',' => {
                let next = chars.clone().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c => out.push(c),
        }
    }
    out
}
