//! Argument normalization between routing and dispatch.
//!
//! Turns whatever the router produced (rule hits carry almost nothing,
//! model output carries inconsistently named keys) plus the operator's
//! text into the argument map an action's schema expects. Name-to-ID
//! resolution is left to the dispatcher.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use aiops_protocol::{InstanceFilter, ResourceKind, ResourceRef};

use crate::context::SessionContext;
use crate::period::extract_period;
use crate::registry::{ActionClass, ActionSpec, ArgKind, Handler, resource_arg};

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z][1-9][a-z]{0,3}\.(?:nano|micro|small|medium|large|\d*xlarge|metal)\b")
        .unwrap()
});

static CIDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}/\d{1,2}\b").unwrap());

/// Words that never form part of a resource name.
const STOP_WORDS: &[&str] = &[
    "create", "launch", "make", "stop", "start", "resize", "delete", "terminate", "instance",
    "server", "a", "an", "new", "named", "with", "type", "the", "check", "inventory", "reboot",
    "restart", "snapshot", "backup", "take", "of", "for", "on", "to", "in", "my", "please", "cpu",
    "metric", "metrics", "utilization", "show", "get", "called", "vpc", "network", "subnet",
    "security", "group", "size", "change", "modify", "it", "this", "that", "again", "now", "and",
    "kill", "destroy", "remove", "up", "down", "turn", "shut", "what", "is",
];

/// Key aliases seen in model output, mapped to schema names.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("instance_type", "size"),
    ("type", "size"),
    ("new_size", "size"),
    ("vpc_id", "network_id"),
    ("vpc", "network_id"),
    ("sg_id", "security_group_id"),
    ("cidr_block", "cidr"),
    ("availability_zone", "zone"),
    ("status", "filter"),
    ("state", "filter"),
    ("start_date", "start"),
    ("end_date", "end"),
];

/// Keys that name the target of a single-resource action.
const TARGET_KEYS: &[&str] = &[
    "id",
    "target",
    "resource_id",
    "resource",
    "instance",
    "instance_name",
    "name",
];

/// Normalized arguments and, when the session context filled the
/// target, the reference that was injected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedArgs {
    pub args: BTreeMap<String, String>,
    pub injected: Option<ResourceRef>,
}

impl NormalizedArgs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

/// Normalize against today's date.
pub fn normalize(
    text: &str,
    spec: &ActionSpec,
    raw_args: &BTreeMap<String, String>,
    context: &SessionContext,
) -> NormalizedArgs {
    normalize_at(
        text,
        spec,
        raw_args,
        context,
        chrono::Local::now().date_naive(),
    )
}

/// Normalize with an explicit `today` for date-relative arguments.
pub fn normalize_at(
    text: &str,
    spec: &ActionSpec,
    raw_args: &BTreeMap<String, String>,
    context: &SessionContext,
    today: NaiveDate,
) -> NormalizedArgs {
    let mut args = canonical_keys(spec, raw_args);
    let mut remaining = text.to_string();

    // Native IDs go straight into the slot for their kind.
    for token in tokens(text) {
        if let Some(kind) = ResourceKind::from_native_id(&token) {
            let key = resource_arg(kind);
            if spec.arg(key).is_some() {
                args.entry(key.to_string()).or_insert_with(|| token.clone());
                remaining = remaining.replace(&token, " ");
            }
        }
    }

    // Sizes and CIDRs must not be mistaken for names.
    if let Some(m) = SIZE_RE.find(&remaining) {
        let size = m.as_str().to_ascii_lowercase();
        if spec.arg("size").is_some() {
            args.entry("size".into()).or_insert(size);
        }
        remaining = SIZE_RE.replace_all(&remaining, " ").into_owned();
    }
    if spec.args.iter().any(|a| a.kind == ArgKind::Cidr) {
        if let Some(m) = CIDR_RE.find(&remaining) {
            args.entry("cidr".into())
                .or_insert_with(|| m.as_str().to_string());
        }
        remaining = CIDR_RE.replace_all(&remaining, " ").into_owned();
    }

    if let Some(slot) = name_slot(spec, &args) {
        let candidate = name_candidate(&remaining, spec.class);
        if !candidate.is_empty() {
            args.insert(slot.to_string(), candidate);
        }
    }

    let mut injected = None;
    if spec.accepts_context() {
        if let (Some(kind), Some(key)) = (spec.target, spec.target_arg()) {
            if !args.contains_key(key) {
                if let Some(reference) = context.get(kind) {
                    tracing::info!(
                        source = "session_context",
                        action = spec.name,
                        id = %reference.id,
                        "injected target from session context"
                    );
                    args.insert(key.to_string(), reference.id.clone());
                    injected = Some(reference.clone());
                }
            }
        }
    }

    if spec.handler == Handler::Cost {
        fill_period(text, today, &mut args);
    }

    if spec.arg("filter").is_some() {
        let filter = match args.get("filter") {
            Some(f) => InstanceFilter::parse_lenient(f),
            None => filter_from_text(text),
        };
        args.insert("filter".into(), filter_word(filter).into());
    }

    for a in spec.args {
        if let Some(default) = a.default {
            args.entry(a.name.to_string())
                .or_insert_with(|| default.to_string());
        }
    }

    NormalizedArgs { args, injected }
}

/// Map raw keys onto the action's schema, dropping blank values and
/// keys the schema does not know.
fn canonical_keys(
    spec: &ActionSpec,
    raw_args: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut args = BTreeMap::new();
    let mut aliased = Vec::new();

    for (key, value) in raw_args {
        let value = value.trim().trim_matches(['"', '\'']).trim();
        if value.is_empty() {
            continue;
        }
        let key = key.trim().to_ascii_lowercase();
        if spec.arg(&key).is_some() {
            args.insert(key, value.to_string());
            continue;
        }
        let canonical = KEY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, name)| *name)
            .or_else(|| {
                (spec.class == ActionClass::Targeted && TARGET_KEYS.contains(&key.as_str()))
                    .then(|| spec.target_arg())
                    .flatten()
            });
        match canonical {
            Some(name) if spec.arg(name).is_some() => aliased.push((name, value.to_string())),
            _ => tracing::debug!(action = spec.name, key = %key, "dropping unknown argument"),
        }
    }

    // Schema-named keys win over aliases.
    for (name, value) in aliased {
        args.entry(name.to_string()).or_insert(value);
    }
    args
}

/// Which argument, if any, the leftover free text should fill.
fn name_slot(spec: &ActionSpec, args: &BTreeMap<String, String>) -> Option<&'static str> {
    match spec.class {
        ActionClass::Targeted => spec.target_arg().filter(|k| !args.contains_key(*k)),
        ActionClass::Create => {
            if spec.arg("name").is_some() {
                (!args.contains_key("name")).then_some("name")
            } else {
                spec.args
                    .iter()
                    .find(|a| {
                        a.required
                            && matches!(a.kind, ArgKind::Resource(_))
                            && !args.contains_key(a.name)
                    })
                    .map(|a| a.name)
            }
        }
        ActionClass::List | ActionClass::Aggregate => None,
    }
}

/// Leftover words after stop-word removal, original case kept.
///
/// Created resources take a single word; targets keep every word so
/// "web server" can still fuzzy-match `web-server-prod`.
fn name_candidate(remaining: &str, class: ActionClass) -> String {
    let words: Vec<String> = tokens(remaining)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.to_ascii_lowercase().as_str()))
        .collect();
    match class {
        ActionClass::Create => words.into_iter().next().unwrap_or_default(),
        _ => words.join(" "),
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| {
                matches!(c, '"' | '\'' | ',' | '.' | '?' | '!' | ':' | ';' | '(' | ')')
            })
        })
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn fill_period(text: &str, today: NaiveDate, args: &mut BTreeMap<String, String>) {
    let period = extract_period(text, today);
    args.entry("start".into())
        .or_insert_with(|| period.start.to_string());
    args.entry("end".into())
        .or_insert_with(|| period.end.to_string());
}

fn filter_from_text(text: &str) -> InstanceFilter {
    let words = tokens(&text.to_ascii_lowercase());
    if words.iter().any(|w| w == "running") {
        InstanceFilter::Running
    } else if words.iter().any(|w| w == "stopped") {
        InstanceFilter::Stopped
    } else {
        InstanceFilter::All
    }
}

fn filter_word(filter: InstanceFilter) -> &'static str {
    match filter {
        InstanceFilter::All => "all",
        InstanceFilter::Running => "running",
        InstanceFilter::Stopped => "stopped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionRegistry;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn run(
        text: &str,
        action: &str,
        raw: &[(&str, &str)],
        context: &SessionContext,
    ) -> NormalizedArgs {
        let registry = ActionRegistry::with_defaults();
        let spec = registry.lookup(action).unwrap();
        let raw: BTreeMap<String, String> = raw
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        normalize_at(text, spec, &raw, context, today())
    }

    fn remembered(id: &str) -> SessionContext {
        let mut context = SessionContext::new();
        context.remember(ResourceRef::instance(id));
        context
    }

    #[test]
    fn target_from_free_text() {
        let n = run("Stop AIOpsmake", "stop_instance", &[], &SessionContext::new());
        assert_eq!(n.get("instance_id"), Some("AIOpsmake"));
        assert!(n.injected.is_none());
    }

    #[test]
    fn native_id_wins_over_free_text() {
        let n = run(
            "reboot i-0123456789abcdef0 please",
            "reboot_instance",
            &[],
            &SessionContext::new(),
        );
        assert_eq!(n.get("instance_id"), Some("i-0123456789abcdef0"));
    }

    #[test]
    fn model_key_aliases() {
        let n = run(
            "",
            "resize_instance",
            &[("instance_name", "batch-worker"), ("instance_type", "t3.large")],
            &SessionContext::new(),
        );
        assert_eq!(n.get("instance_id"), Some("batch-worker"));
        assert_eq!(n.get("size"), Some("t3.large"));
    }

    #[test]
    fn size_token_is_not_a_name() {
        let n = run(
            "resize web-server-prod to t3.large",
            "resize_instance",
            &[],
            &SessionContext::new(),
        );
        assert_eq!(n.get("size"), Some("t3.large"));
        assert_eq!(n.get("instance_id"), Some("web-server-prod"));
    }

    #[test]
    fn create_instance_name_and_defaults() {
        let n = run(
            "create a new instance named web-01 with type t3.small",
            "create_instance",
            &[],
            &SessionContext::new(),
        );
        assert_eq!(n.get("name"), Some("web-01"));
        assert_eq!(n.get("size"), Some("t3.small"));
        assert_eq!(n.get("image"), Some("ami-default"));

        let n = run("launch an instance", "create_instance", &[], &SessionContext::new());
        assert_eq!(n.get("name"), Some("new-instance"));
        assert_eq!(n.get("size"), Some("t3.micro"));
    }

    #[test]
    fn cidr_for_network_creation() {
        let n = run(
            "create vpc 10.20.0.0/16",
            "create_network",
            &[],
            &SessionContext::new(),
        );
        assert_eq!(n.get("cidr"), Some("10.20.0.0/16"));
        assert_eq!(n.get("name"), None);
    }

    #[test]
    fn context_fills_missing_target() {
        let n = run(
            "reboot it",
            "reboot_instance",
            &[],
            &remembered("i-0aaaaaaaaaaaaaaa1"),
        );
        assert_eq!(n.get("instance_id"), Some("i-0aaaaaaaaaaaaaaa1"));
        assert_eq!(
            n.injected,
            Some(ResourceRef::instance("i-0aaaaaaaaaaaaaaa1"))
        );
    }

    #[test]
    fn explicit_target_beats_context() {
        let n = run(
            "stop batch-worker",
            "stop_instance",
            &[],
            &remembered("i-0aaaaaaaaaaaaaaa1"),
        );
        assert_eq!(n.get("instance_id"), Some("batch-worker"));
        assert!(n.injected.is_none());
    }

    #[test]
    fn no_injection_for_create_list_or_cost() {
        let context = remembered("i-0aaaaaaaaaaaaaaa1");
        for (text, action) in [
            ("create instance", "create_instance"),
            ("list instances", "list_instances"),
            ("show topology", "list_networks"),
            ("what did we spend", "get_cost"),
        ] {
            let n = run(text, action, &[], &context);
            assert!(n.injected.is_none(), "{action} injected context");
            assert!(
                !n.args.values().any(|v| v == "i-0aaaaaaaaaaaaaaa1"),
                "{action} carries the remembered id"
            );
        }
    }

    #[test]
    fn cost_window_from_text() {
        let n = run("cost for Q1", "get_cost", &[], &SessionContext::new());
        assert_eq!(n.get("start"), Some("2025-01-01"));
        assert_eq!(n.get("end"), Some("2025-03-31"));

        let n = run(
            "cost",
            "get_cost",
            &[("start_date", "2025-02-01"), ("end_date", "2025-02-10")],
            &SessionContext::new(),
        );
        assert_eq!(n.get("start"), Some("2025-02-01"));
        assert_eq!(n.get("end"), Some("2025-02-10"));
    }

    #[test]
    fn list_filter_is_canonical() {
        let n = run(
            "show instances",
            "list_instances",
            &[("status", "RUNNING")],
            &SessionContext::new(),
        );
        assert_eq!(n.get("filter"), Some("running"));

        let n = run("show stopped instances", "list_instances", &[], &SessionContext::new());
        assert_eq!(n.get("filter"), Some("stopped"));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let n = run(
            "stop web",
            "stop_instance",
            &[("force", "true"), ("instance_id", "web")],
            &SessionContext::new(),
        );
        assert_eq!(n.args.len(), 1);
        assert_eq!(n.get("instance_id"), Some("web"));
    }
}
