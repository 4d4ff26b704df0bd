use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured intent recovered from free-form model output.
///
/// Untrusted: `action` may not name a registered action and `args`
/// may be empty. Callers check it against the action registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntentCandidate {
    pub action: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl IntentCandidate {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// What the remediation loop may do about an incident.
///
/// The vocabulary has no destructive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemediationAction {
    #[serde(rename = "START_INSTANCE")]
    Start,
    #[serde(rename = "REBOOT_INSTANCE")]
    Reboot,
    #[serde(rename = "ADVISE_SCALE_UP")]
    AdviseScaleUp,
    #[serde(rename = "MANUAL_CHECK")]
    ManualCheck,
    /// Take no action. A valid decision, not a parse failure.
    #[serde(rename = "NONE")]
    None,
}

impl RemediationAction {
    pub fn label(self) -> &'static str {
        match self {
            RemediationAction::Start => "START_INSTANCE",
            RemediationAction::Reboot => "REBOOT_INSTANCE",
            RemediationAction::AdviseScaleUp => "ADVISE_SCALE_UP",
            RemediationAction::ManualCheck => "MANUAL_CHECK",
            RemediationAction::None => "NONE",
        }
    }

    /// Tolerant label parse: case-insensitive, accepts short forms
    /// (`START`, `REBOOT`, `SCALE_UP`) and space/hyphen separators.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match normalized.as_str() {
            "START_INSTANCE" | "START" => Some(RemediationAction::Start),
            "REBOOT_INSTANCE" | "REBOOT" | "RESTART" => Some(RemediationAction::Reboot),
            "ADVISE_SCALE_UP" | "SCALE_UP" | "ADVISE_SCALEUP" => {
                Some(RemediationAction::AdviseScaleUp)
            }
            "MANUAL_CHECK" | "MANUAL" => Some(RemediationAction::ManualCheck),
            "NONE" | "NO_ACTION" | "NOOP" => Some(RemediationAction::None),
            _ => None,
        }
    }

    /// Whether executing this action changes cloud state.
    pub fn is_mutating(self) -> bool {
        matches!(self, RemediationAction::Start | RemediationAction::Reboot)
    }
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A model's remediation verdict for one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationDecision {
    pub action: RemediationAction,
    pub root_cause: String,
    pub reason: String,
}
