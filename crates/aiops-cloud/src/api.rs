//! Capability interface of the cloud resource collaborator.
//!
//! Each method is one remote call. Implementations are assumed safe to
//! call concurrently from the operator path and the remediation loop;
//! callers impose their own per-call timeouts.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use aiops_protocol::{
    InstanceFilter, InstanceRow, InstanceState, NetworkRow, ResourceKind, ResourceRef,
    ResourceSummary,
};

use crate::error::CloudResult;

/// Parameters for launching an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub image: String,
    pub size: String,
    pub subnet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    pub name: String,
}

/// Trait for cloud provider implementations.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Region this client is bound to.
    fn region(&self) -> &str;

    async fn create_network(&self, cidr: &str) -> CloudResult<ResourceRef>;

    async fn create_subnet(
        &self,
        network_id: &str,
        cidr: &str,
        zone: Option<&str>,
    ) -> CloudResult<ResourceRef>;

    async fn create_security_group(&self, network_id: &str, name: &str)
    -> CloudResult<ResourceRef>;

    async fn create_instance(&self, spec: &InstanceSpec) -> CloudResult<ResourceRef>;

    async fn list_instances(&self, filter: InstanceFilter) -> CloudResult<Vec<InstanceRow>>;

    /// Every resource of `kind` with its display name, including
    /// terminated ones (flagged inactive).
    async fn list_resources(&self, kind: ResourceKind) -> CloudResult<Vec<ResourceSummary>>;

    /// Start an instance, returning its new state.
    async fn start_instance(&self, id: &str) -> CloudResult<InstanceState>;

    async fn stop_instance(&self, id: &str) -> CloudResult<InstanceState>;

    async fn reboot_instance(&self, id: &str) -> CloudResult<InstanceState>;

    async fn terminate_instance(&self, id: &str) -> CloudResult<InstanceState>;

    /// Change the instance size. Fails unless the instance is stopped.
    async fn resize_instance(&self, id: &str, size: &str) -> CloudResult<()>;

    /// Snapshot the instance's root volume, returning the snapshot ID.
    async fn create_snapshot(&self, id: &str) -> CloudResult<String>;

    async fn get_metric(&self, id: &str, metric: &str) -> CloudResult<f64>;

    /// Total spend for the inclusive date range.
    async fn get_cost(&self, start: NaiveDate, end: NaiveDate) -> CloudResult<f64>;

    async fn list_networks(&self) -> CloudResult<Vec<NetworkRow>>;

    /// The most recent `lines` system log lines for an instance.
    async fn recent_logs(&self, id: &str, lines: usize) -> CloudResult<Vec<String>>;
}
