use serde::{Deserialize, Serialize};

/// Severity assigned to an incident during a scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentTier {
    /// The instance is down (lifecycle state `stopped`).
    Critical,
    /// The instance is up but running hot.
    Warning,
}

impl IncidentTier {
    /// Short impact description used in notifications.
    pub fn impact(self) -> &'static str {
        match self {
            IncidentTier::Critical => "Service Outage",
            IncidentTier::Warning => "Latency Risk",
        }
    }

    /// Slack emoji shortcode for the tier.
    pub fn emoji(self) -> &'static str {
        match self {
            IncidentTier::Critical => ":red_circle:",
            IncidentTier::Warning => ":large_orange_circle:",
        }
    }
}

/// An anomaly found on one instance during one scan.
///
/// Scoped to a single tick; never persisted across scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub resource_id: String,
    pub name: String,
    pub tier: IncidentTier,
    /// What tripped the classifier, e.g. `High CPU (91.2%)`.
    pub trigger: String,
}
