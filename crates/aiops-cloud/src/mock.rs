//! In-memory cloud provider.
//!
//! Models just enough lifecycle behaviour (state transitions, resize
//! preconditions, topology) for the engine to be exercised without a real
//! account. Every capability call is recorded so tests can assert on
//! exactly which side effects happened.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use aiops_protocol::{
    InstanceFilter, InstanceRow, InstanceState, NetworkRow, ResourceKind, ResourceRef,
    ResourceSummary, SubnetRow,
};

use crate::api::{CloudApi, InstanceSpec};
use crate::error::{CloudError, CloudResult};

/// Default spend per day used by `get_cost`.
const DEFAULT_DAILY_COST: f64 = 3.2;

/// A capability call recorded by [`MockCloud`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub capability: &'static str,
    pub target: String,
    /// Whether the call changes provider state.
    pub mutating: bool,
}

#[derive(Debug, Clone)]
struct MockInstance {
    id: String,
    name: String,
    state: InstanceState,
    utilization: f64,
    size: String,
    subnet_id: Option<String>,
}

#[derive(Debug, Clone)]
struct MockNetwork {
    id: String,
    name: String,
    cidr: String,
}

#[derive(Debug, Clone)]
struct MockSubnet {
    id: String,
    network_id: String,
    cidr: String,
    zone: Option<String>,
}

#[derive(Debug, Clone)]
struct MockGroup {
    id: String,
    network_id: String,
    name: String,
}

#[derive(Debug, Default)]
struct CloudState {
    instances: Vec<MockInstance>,
    networks: Vec<MockNetwork>,
    subnets: Vec<MockSubnet>,
    groups: Vec<MockGroup>,
    snapshots: Vec<(String, String)>,
    logs: HashMap<String, Vec<String>>,
    calls: Vec<RecordedCall>,
    listing_error: Option<String>,
}

impl CloudState {
    fn record(&mut self, capability: &'static str, target: impl Into<String>, mutating: bool) {
        self.calls.push(RecordedCall {
            capability,
            target: target.into(),
            mutating,
        });
    }

    fn instance_mut(&mut self, id: &str) -> CloudResult<&mut MockInstance> {
        self.instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CloudError::NotFound(id.to_string()))
    }
}

/// In-memory [`CloudApi`] implementation with call recording.
pub struct MockCloud {
    region: String,
    daily_cost: f64,
    state: Mutex<CloudState>,
}

impl MockCloud {
    /// Create an empty provider bound to `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            daily_cost: DEFAULT_DAILY_COST,
            state: Mutex::new(CloudState::default()),
        }
    }

    /// A small sandbox estate: one network, one subnet, one security group
    /// and three instances (one healthy, one hot, one stopped).
    pub fn with_sample_data(region: impl Into<String>) -> Self {
        let cloud = Self::new(region);
        let vpc = cloud.add_network("core-vpc", "10.0.0.0/16");
        let subnet = cloud.add_subnet(&vpc, "10.0.1.0/24", Some("a"));
        cloud.add_security_group(&vpc, "web-sg");

        let web = cloud.add_instance("web-server-prod", InstanceState::Running, 37.5);
        let batch = cloud.add_instance("batch-worker", InstanceState::Running, 91.2);
        let stopped = cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
        {
            let mut state = cloud.state();
            for inst in state.instances.iter_mut() {
                inst.subnet_id = Some(subnet.clone());
            }
        }
        cloud.set_logs(
            &web,
            vec!["nginx: GET /healthz 200".into(), "nginx: GET / 200".into()],
        );
        cloud.set_logs(
            &batch,
            vec![
                "worker: job 8812 started".into(),
                "worker: queue depth 4120, backlog growing".into(),
                "kernel: CPU3 temperature above threshold".into(),
            ],
        );
        cloud.set_logs(
            &stopped,
            vec![
                "systemd: Stopping AIOps maker service".into(),
                "kernel: reboot: Power down".into(),
            ],
        );
        cloud
    }

    /// Override the per-day spend used by `get_cost`.
    pub fn with_daily_cost(mut self, daily_cost: f64) -> Self {
        self.daily_cost = daily_cost;
        self
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an instance directly (no call recorded). Returns its ID.
    pub fn add_instance(&self, name: &str, state: InstanceState, utilization: f64) -> String {
        let id = new_id(ResourceKind::Instance);
        self.state().instances.push(MockInstance {
            id: id.clone(),
            name: name.to_string(),
            state,
            utilization,
            size: "t3.micro".into(),
            subnet_id: None,
        });
        id
    }

    /// Add a network directly. Returns its ID.
    pub fn add_network(&self, name: &str, cidr: &str) -> String {
        let id = new_id(ResourceKind::Network);
        self.state().networks.push(MockNetwork {
            id: id.clone(),
            name: name.to_string(),
            cidr: cidr.to_string(),
        });
        id
    }

    /// Add a subnet directly. Returns its ID.
    pub fn add_subnet(&self, network_id: &str, cidr: &str, zone: Option<&str>) -> String {
        let id = new_id(ResourceKind::Subnet);
        self.state().subnets.push(MockSubnet {
            id: id.clone(),
            network_id: network_id.to_string(),
            cidr: cidr.to_string(),
            zone: zone.map(str::to_string),
        });
        id
    }

    /// Add a security group directly. Returns its ID.
    pub fn add_security_group(&self, network_id: &str, name: &str) -> String {
        let id = new_id(ResourceKind::SecurityGroup);
        self.state().groups.push(MockGroup {
            id: id.clone(),
            network_id: network_id.to_string(),
            name: name.to_string(),
        });
        id
    }

    pub fn set_state(&self, id: &str, new_state: InstanceState) {
        if let Some(inst) = self.state().instances.iter_mut().find(|i| i.id == id) {
            inst.state = new_state;
        }
    }

    pub fn set_utilization(&self, id: &str, utilization: f64) {
        if let Some(inst) = self.state().instances.iter_mut().find(|i| i.id == id) {
            inst.utilization = utilization;
        }
    }

    pub fn set_logs(&self, id: &str, lines: Vec<String>) {
        self.state().logs.insert(id.to_string(), lines);
    }

    /// Make every subsequent `list_instances` and `list_resources` call
    /// fail with `message`.
    pub fn fail_listing(&self, message: impl Into<String>) {
        self.state().listing_error = Some(message.into());
    }

    pub fn clear_listing_failure(&self) {
        self.state().listing_error = None;
    }

    /// Current view of one instance.
    pub fn instance(&self, id: &str) -> Option<InstanceRow> {
        self.state()
            .instances
            .iter()
            .find(|i| i.id == id)
            .map(to_row)
    }

    /// All recorded capability calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Recorded calls that changed provider state.
    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.mutating)
            .cloned()
            .collect()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    fn transition(
        &self,
        capability: &'static str,
        id: &str,
        allowed_from: &[InstanceState],
        to: InstanceState,
    ) -> CloudResult<InstanceState> {
        let mut state = self.state();
        state.record(capability, id, true);
        let inst = state.instance_mut(id)?;

        if inst.state == to {
            return Ok(to);
        }
        if inst.state.is_terminal() || !allowed_from.contains(&inst.state) {
            let expected = allowed_from
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(CloudError::InvalidState {
                id: id.to_string(),
                expected,
                actual: inst.state.to_string(),
            });
        }

        inst.state = to;
        if to != InstanceState::Running {
            inst.utilization = 0.0;
        }
        tracing::debug!(instance_id = %id, capability, state = %to, "mock transition");
        Ok(to)
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new("ap-northeast-2")
    }
}

fn new_id(kind: ResourceKind) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", kind.id_prefix(), &hex[..17])
}

fn to_row(inst: &MockInstance) -> InstanceRow {
    InstanceRow {
        id: inst.id.clone(),
        name: inst.name.clone(),
        state: inst.state,
        utilization: inst.utilization,
        size: inst.size.clone(),
    }
}

fn looks_like_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let octets_ok = addr.split('.').count() == 4
        && addr.split('.').all(|o| o.parse::<u8>().is_ok());
    octets_ok && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
}

#[async_trait]
impl CloudApi for MockCloud {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create_network(&self, cidr: &str) -> CloudResult<ResourceRef> {
        self.state().record("create_network", cidr, true);
        if !looks_like_cidr(cidr) {
            return Err(CloudError::InvalidArgument(format!("bad CIDR block: {cidr}")));
        }
        let id = self.add_network("", cidr);
        Ok(ResourceRef::new(ResourceKind::Network, id))
    }

    async fn create_subnet(
        &self,
        network_id: &str,
        cidr: &str,
        zone: Option<&str>,
    ) -> CloudResult<ResourceRef> {
        {
            let mut state = self.state();
            state.record("create_subnet", network_id, true);
            if !state.networks.iter().any(|n| n.id == network_id) {
                return Err(CloudError::NotFound(network_id.to_string()));
            }
        }
        if !looks_like_cidr(cidr) {
            return Err(CloudError::InvalidArgument(format!("bad CIDR block: {cidr}")));
        }
        let id = self.add_subnet(network_id, cidr, zone);
        Ok(ResourceRef::new(ResourceKind::Subnet, id))
    }

    async fn create_security_group(
        &self,
        network_id: &str,
        name: &str,
    ) -> CloudResult<ResourceRef> {
        {
            let mut state = self.state();
            state.record("create_security_group", network_id, true);
            if !state.networks.iter().any(|n| n.id == network_id) {
                return Err(CloudError::NotFound(network_id.to_string()));
            }
        }
        let id = self.add_security_group(network_id, name);
        Ok(ResourceRef::new(ResourceKind::SecurityGroup, id))
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> CloudResult<ResourceRef> {
        let mut state = self.state();
        state.record("create_instance", &spec.name, true);
        let Some(subnet) = state.subnets.iter().find(|s| s.id == spec.subnet_id) else {
            return Err(CloudError::NotFound(spec.subnet_id.clone()));
        };
        if let Some(sg) = &spec.security_group_id {
            let group = state
                .groups
                .iter()
                .find(|g| &g.id == sg)
                .ok_or_else(|| CloudError::NotFound(sg.clone()))?;
            if group.network_id != subnet.network_id {
                return Err(CloudError::InvalidArgument(format!(
                    "security group {sg} belongs to {}, subnet {} to {}",
                    group.network_id, subnet.id, subnet.network_id
                )));
            }
        }

        let id = new_id(ResourceKind::Instance);
        state.instances.push(MockInstance {
            id: id.clone(),
            name: spec.name.clone(),
            state: InstanceState::Running,
            utilization: 0.0,
            size: spec.size.clone(),
            subnet_id: Some(spec.subnet_id.clone()),
        });
        Ok(ResourceRef::instance(id))
    }

    async fn list_instances(&self, filter: InstanceFilter) -> CloudResult<Vec<InstanceRow>> {
        let mut state = self.state();
        state.record("list_instances", "", false);
        if let Some(message) = &state.listing_error {
            return Err(CloudError::Provider(message.clone()));
        }
        Ok(state
            .instances
            .iter()
            .filter(|i| filter.admits(i.state))
            .map(to_row)
            .collect())
    }

    async fn list_resources(&self, kind: ResourceKind) -> CloudResult<Vec<ResourceSummary>> {
        let mut state = self.state();
        state.record("list_resources", kind.label(), false);
        if let Some(message) = &state.listing_error {
            return Err(CloudError::Provider(message.clone()));
        }
        let summaries = match kind {
            ResourceKind::Instance => state
                .instances
                .iter()
                .map(|i| ResourceSummary {
                    kind,
                    id: i.id.clone(),
                    name: i.name.clone(),
                    active: !i.state.is_terminal(),
                })
                .collect(),
            ResourceKind::Network => state
                .networks
                .iter()
                .map(|n| ResourceSummary {
                    kind,
                    id: n.id.clone(),
                    name: n.name.clone(),
                    active: true,
                })
                .collect(),
            ResourceKind::Subnet => state
                .subnets
                .iter()
                .map(|s| ResourceSummary {
                    kind,
                    id: s.id.clone(),
                    name: String::new(),
                    active: true,
                })
                .collect(),
            ResourceKind::SecurityGroup => state
                .groups
                .iter()
                .map(|g| ResourceSummary {
                    kind,
                    id: g.id.clone(),
                    name: g.name.clone(),
                    active: true,
                })
                .collect(),
        };
        Ok(summaries)
    }

    async fn start_instance(&self, id: &str) -> CloudResult<InstanceState> {
        self.transition(
            "start_instance",
            id,
            &[InstanceState::Stopped],
            InstanceState::Running,
        )
    }

    async fn stop_instance(&self, id: &str) -> CloudResult<InstanceState> {
        self.transition(
            "stop_instance",
            id,
            &[InstanceState::Pending, InstanceState::Running],
            InstanceState::Stopped,
        )
    }

    async fn reboot_instance(&self, id: &str) -> CloudResult<InstanceState> {
        self.transition(
            "reboot_instance",
            id,
            &[InstanceState::Running],
            InstanceState::Running,
        )
    }

    async fn terminate_instance(&self, id: &str) -> CloudResult<InstanceState> {
        self.transition(
            "terminate_instance",
            id,
            &[
                InstanceState::Pending,
                InstanceState::Running,
                InstanceState::Stopping,
                InstanceState::Stopped,
            ],
            InstanceState::Terminated,
        )
    }

    async fn resize_instance(&self, id: &str, size: &str) -> CloudResult<()> {
        let mut state = self.state();
        state.record("resize_instance", id, true);
        let inst = state.instance_mut(id)?;
        if inst.state != InstanceState::Stopped {
            return Err(CloudError::InvalidState {
                id: id.to_string(),
                expected: InstanceState::Stopped.to_string(),
                actual: inst.state.to_string(),
            });
        }
        inst.size = size.to_string();
        Ok(())
    }

    async fn create_snapshot(&self, id: &str) -> CloudResult<String> {
        let mut state = self.state();
        state.record("create_snapshot", id, true);
        let inst = state.instance_mut(id)?;
        if inst.state.is_terminal() {
            return Err(CloudError::NotFound(id.to_string()));
        }
        let hex = Uuid::new_v4().simple().to_string();
        let snapshot_id = format!("snap-{}", &hex[..17]);
        state.snapshots.push((snapshot_id.clone(), id.to_string()));
        Ok(snapshot_id)
    }

    async fn get_metric(&self, id: &str, metric: &str) -> CloudResult<f64> {
        let mut state = self.state();
        state.record("get_metric", id, false);
        let inst = state.instance_mut(id)?;
        match metric.to_ascii_lowercase().as_str() {
            "cpuutilization" | "cpu" | "utilization" => Ok(inst.utilization),
            other => Err(CloudError::InvalidArgument(format!("unknown metric: {other}"))),
        }
    }

    async fn get_cost(&self, start: NaiveDate, end: NaiveDate) -> CloudResult<f64> {
        self.state().record("get_cost", format!("{start}..{end}"), false);
        if end < start {
            return Err(CloudError::InvalidArgument(format!(
                "cost range ends before it starts: {start} > {end}"
            )));
        }
        let days = (end - start).num_days() + 1;
        let total = days as f64 * self.daily_cost;
        Ok((total * 100.0).round() / 100.0)
    }

    async fn list_networks(&self) -> CloudResult<Vec<NetworkRow>> {
        let mut state = self.state();
        state.record("list_networks", "", false);
        let rows = state
            .networks
            .iter()
            .map(|n| NetworkRow {
                id: n.id.clone(),
                name: n.name.clone(),
                cidr: n.cidr.clone(),
                subnets: state
                    .subnets
                    .iter()
                    .filter(|s| s.network_id == n.id)
                    .map(|s| SubnetRow {
                        id: s.id.clone(),
                        cidr: s.cidr.clone(),
                        zone: s.zone.clone(),
                        instance_ids: state
                            .instances
                            .iter()
                            .filter(|i| i.subnet_id.as_deref() == Some(s.id.as_str()))
                            .filter(|i| !i.state.is_terminal())
                            .map(|i| i.id.clone())
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Ok(rows)
    }

    async fn recent_logs(&self, id: &str, lines: usize) -> CloudResult<Vec<String>> {
        let mut state = self.state();
        state.record("recent_logs", id, false);
        if !state.instances.iter().any(|i| i.id == id) {
            return Err(CloudError::NotFound(id.to_string()));
        }
        let all = state.logs.get(id).cloned().unwrap_or_default();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].to_vec())
    }
}
