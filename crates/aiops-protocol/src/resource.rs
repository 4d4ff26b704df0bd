use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Class of cloud resource the core knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    Network,
    Subnet,
    SecurityGroup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Instance,
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::SecurityGroup,
    ];

    /// Provider-assigned ID prefix (e.g. `i-` for instances).
    pub fn id_prefix(self) -> &'static str {
        match self {
            ResourceKind::Instance => "i-",
            ResourceKind::Network => "vpc-",
            ResourceKind::Subnet => "subnet-",
            ResourceKind::SecurityGroup => "sg-",
        }
    }

    /// Human-readable label used in operator responses.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "security group",
        }
    }

    /// Whether `text` has this kind's native ID shape: the fixed prefix
    /// followed by 8 to 17 lowercase hex characters.
    pub fn matches_native_id(self, text: &str) -> bool {
        let Some(rest) = text.strip_prefix(self.id_prefix()) else {
            return false;
        };
        (8..=17).contains(&rest.len())
            && rest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// Infer the kind from a native-shaped ID.
    pub fn from_native_id(text: &str) -> Option<ResourceKind> {
        Self::ALL.into_iter().find(|k| k.matches_native_id(text))
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A resolved reference to exactly one concrete resource.
///
/// Never mutated after resolution; a new reference replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn instance(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Instance, id)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Instance lifecycle state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    /// Terminated (or terminating) instances are invisible to name resolution.
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceState::ShuttingDown | InstanceState::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider state string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instance state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for InstanceState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "stopping" => Ok(InstanceState::Stopping),
            "stopped" => Ok(InstanceState::Stopped),
            "shutting-down" | "shutting_down" => Ok(InstanceState::ShuttingDown),
            "terminated" => Ok(InstanceState::Terminated),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// One row of the instance inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRow {
    pub id: String,
    pub name: String,
    pub state: InstanceState,
    /// Average CPU utilization in percent (0.0 when not running).
    pub utilization: f64,
    /// Instance size, e.g. `t3.micro`.
    #[serde(default)]
    pub size: String,
}

/// Filter applied to an inventory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceFilter {
    #[default]
    All,
    Running,
    Stopped,
}

impl InstanceFilter {
    pub fn admits(self, state: InstanceState) -> bool {
        match self {
            InstanceFilter::All => true,
            InstanceFilter::Running => state == InstanceState::Running,
            InstanceFilter::Stopped => state == InstanceState::Stopped,
        }
    }

    /// Lenient parse of an operator-supplied filter word; unknown words mean `All`.
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "running" => InstanceFilter::Running,
            "stopped" => InstanceFilter::Stopped,
            _ => InstanceFilter::All,
        }
    }
}

/// One subnet in a topology listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRow {
    pub id: String,
    pub cidr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub instance_ids: Vec<String>,
}

/// One network (VPC) in a topology listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRow {
    pub id: String,
    pub name: String,
    pub cidr: String,
    pub subnets: Vec<SubnetRow>,
}

/// Minimal view of any addressable resource, used for name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub id: String,
    /// Display name (the provider's `Name` tag); may be empty.
    pub name: String,
    /// False for terminated / terminating resources.
    pub active: bool,
}
