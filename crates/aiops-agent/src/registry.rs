//! Declarative action registry.
//!
//! The single table consulted by the router (vocabulary and aliases), the
//! normalizer (argument schema, defaults, context eligibility), the safety
//! gate (criticality) and the remediation loop (autonomous allow-list).

use std::collections::HashMap;

use aiops_protocol::ResourceKind;

/// How an action relates to existing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// Creates a new resource.
    Create,
    /// Enumerates resources.
    List,
    /// Account-wide figures (cost).
    Aggregate,
    /// Operates on one existing resource.
    Targeted,
}

/// Dispatcher routine that executes an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    CreateNetwork,
    CreateSubnet,
    CreateSecurityGroup,
    CreateInstance,
    ListInstances,
    ListNetworks,
    Start,
    Stop,
    Reboot,
    Terminate,
    Resize,
    Snapshot,
    Metric,
    Cost,
}

/// Shape of one argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    /// Reference to an existing resource, resolved before dispatch.
    Resource(ResourceKind),
    /// Instance size, e.g. `t3.large`.
    Size,
    Cidr,
    /// ISO-8601 date.
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

const fn arg(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: false,
        default: None,
    }
}

const fn required(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: true,
        default: None,
    }
}

const fn defaulted(name: &'static str, kind: ArgKind, default: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: false,
        default: Some(default),
    }
}

/// Argument key holding a reference to a resource of `kind`.
pub fn resource_arg(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Instance => "instance_id",
        ResourceKind::Network => "network_id",
        ResourceKind::Subnet => "subnet_id",
        ResourceKind::SecurityGroup => "security_group_id",
    }
}

/// One recognized action.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub class: ActionClass,
    pub handler: Handler,
    /// Kind of the resource a `Targeted` action operates on.
    pub target: Option<ResourceKind>,
    pub args: &'static [ArgSpec],
    /// Requires operator confirmation before dispatch.
    pub critical: bool,
    /// May be dispatched by the remediation loop without a human.
    pub autonomous: bool,
}

impl ActionSpec {
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Argument key of the target, for `Targeted` actions.
    pub fn target_arg(&self) -> Option<&'static str> {
        self.target.map(resource_arg)
    }

    /// Whether the session context may fill an omitted target.
    pub fn accepts_context(&self) -> bool {
        self.class == ActionClass::Targeted && self.target.is_some()
    }
}

const INSTANCE: ArgKind = ArgKind::Resource(ResourceKind::Instance);
const NETWORK: ArgKind = ArgKind::Resource(ResourceKind::Network);
const SUBNET: ArgKind = ArgKind::Resource(ResourceKind::Subnet);
const SECURITY_GROUP: ArgKind = ArgKind::Resource(ResourceKind::SecurityGroup);

const fn targeted(
    name: &'static str,
    handler: Handler,
    aliases: &'static [&'static str],
    description: &'static str,
    args: &'static [ArgSpec],
    critical: bool,
    autonomous: bool,
) -> ActionSpec {
    ActionSpec {
        name,
        aliases,
        description,
        class: ActionClass::Targeted,
        handler,
        target: Some(ResourceKind::Instance),
        args,
        critical,
        autonomous,
    }
}

pub const DEFAULT_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "create_network",
        aliases: &["create_vpc"],
        description: "Create a network (VPC)",
        class: ActionClass::Create,
        handler: Handler::CreateNetwork,
        target: None,
        args: &[
            defaulted("cidr", ArgKind::Cidr, "10.0.0.0/16"),
            arg("name", ArgKind::Text),
        ],
        critical: false,
        autonomous: false,
    },
    ActionSpec {
        name: "create_subnet",
        aliases: &[],
        description: "Create a subnet inside a network",
        class: ActionClass::Create,
        handler: Handler::CreateSubnet,
        target: None,
        args: &[
            required("network_id", NETWORK),
            defaulted("cidr", ArgKind::Cidr, "10.0.1.0/24"),
            arg("zone", ArgKind::Text),
        ],
        critical: false,
        autonomous: false,
    },
    ActionSpec {
        name: "create_security_group",
        aliases: &["create_sg"],
        description: "Create a security group inside a network",
        class: ActionClass::Create,
        handler: Handler::CreateSecurityGroup,
        target: None,
        args: &[
            required("network_id", NETWORK),
            defaulted("name", ArgKind::Text, "aiops-sg"),
        ],
        critical: false,
        autonomous: false,
    },
    ActionSpec {
        name: "create_instance",
        aliases: &["launch_instance", "run_instance"],
        description: "Launch a new instance",
        class: ActionClass::Create,
        handler: Handler::CreateInstance,
        target: None,
        args: &[
            defaulted("name", ArgKind::Text, "new-instance"),
            defaulted("size", ArgKind::Size, "t3.micro"),
            defaulted("image", ArgKind::Text, "ami-default"),
            arg("subnet_id", SUBNET),
            arg("security_group_id", SECURITY_GROUP),
        ],
        critical: false,
        autonomous: false,
    },
    ActionSpec {
        name: "list_instances",
        aliases: &["describe_instances", "inventory"],
        description: "List instances with state and CPU utilization",
        class: ActionClass::List,
        handler: Handler::ListInstances,
        target: None,
        args: &[defaulted("filter", ArgKind::Text, "all")],
        critical: false,
        autonomous: false,
    },
    ActionSpec {
        name: "list_networks",
        aliases: &["generate_topology", "topology"],
        description: "Show networks, subnets and the instances in them",
        class: ActionClass::List,
        handler: Handler::ListNetworks,
        target: None,
        args: &[],
        critical: false,
        autonomous: false,
    },
    targeted(
        "start_instance",
        Handler::Start,
        &[],
        "Start a stopped instance",
        &[required("instance_id", INSTANCE)],
        false,
        true,
    ),
    targeted(
        "stop_instance",
        Handler::Stop,
        &[],
        "Stop a running instance",
        &[required("instance_id", INSTANCE)],
        true,
        false,
    ),
    targeted(
        "reboot_instance",
        Handler::Reboot,
        &["restart_instance"],
        "Reboot a running instance",
        &[required("instance_id", INSTANCE)],
        false,
        true,
    ),
    targeted(
        "terminate_instance",
        Handler::Terminate,
        &["delete_resource", "delete_instance"],
        "Terminate an instance permanently",
        &[required("instance_id", INSTANCE)],
        true,
        false,
    ),
    targeted(
        "resize_instance",
        Handler::Resize,
        &["modify_instance"],
        "Change the size of a stopped instance",
        &[
            required("instance_id", INSTANCE),
            required("size", ArgKind::Size),
        ],
        true,
        false,
    ),
    targeted(
        "create_snapshot",
        Handler::Snapshot,
        &["snapshot_instance", "backup_instance"],
        "Snapshot an instance's root volume",
        &[required("instance_id", INSTANCE)],
        false,
        false,
    ),
    targeted(
        "get_metric",
        Handler::Metric,
        &["get_metrics"],
        "Read a metric (default CPUUtilization) for an instance",
        &[
            required("instance_id", INSTANCE),
            defaulted("metric", ArgKind::Text, "CPUUtilization"),
        ],
        false,
        false,
    ),
    ActionSpec {
        name: "get_cost",
        aliases: &["get_billing"],
        description: "Total spend for a date range",
        class: ActionClass::Aggregate,
        handler: Handler::Cost,
        target: None,
        args: &[arg("start", ArgKind::Date), arg("end", ArgKind::Date)],
        critical: false,
        autonomous: false,
    },
];

/// Lookup table over the action vocabulary.
///
/// Names and aliases are indexed case-insensitively.
pub struct ActionRegistry {
    actions: Vec<ActionSpec>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new(actions: Vec<ActionSpec>) -> Self {
        let mut index = HashMap::new();
        for (i, spec) in actions.iter().enumerate() {
            index.insert(spec.name.to_string(), i);
            for alias in spec.aliases {
                index.insert((*alias).to_string(), i);
            }
        }
        Self { actions, index }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_ACTIONS.to_vec())
    }

    /// Resolve a name or alias to its canonical spec.
    pub fn lookup(&self, name: &str) -> Option<&ActionSpec> {
        let key = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        self.index.get(&key).map(|&i| &self.actions[i])
    }

    pub fn is_critical(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|s| s.critical)
    }

    pub fn is_autonomous(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|s| s.autonomous)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.iter()
    }

    /// Every name and alias with the canonical name it maps to.
    pub fn vocabulary(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().flat_map(|spec| {
            std::iter::once((spec.name, spec.name))
                .chain(spec.aliases.iter().map(move |alias| (*alias, spec.name)))
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action list for the model prompt, one line per action with its
    /// argument names.
    pub fn vocabulary_prompt(&self) -> String {
        let mut out = String::new();
        for spec in &self.actions {
            let args = spec
                .args
                .iter()
                .map(|a| {
                    if a.required {
                        a.name.to_string()
                    } else {
                        format!("{}?", a.name)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("- {} ({}): {}\n", spec.name, args, spec.description));
        }
        out
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
