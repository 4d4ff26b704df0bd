//! Action dispatch against the cloud collaborator.
//!
//! Owns the client handle. A region switch builds a new client and
//! swaps it in whole; requests already holding the old `Arc` finish on
//! it. Every capability call is bounded by the configured timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use aiops_cloud::{CloudApi, CloudResult, InstanceSpec};
use aiops_protocol::{
    InstanceFilter, InstanceState, RemediationAction, ResourceKind, ResourceRef,
};

use crate::error::{OpsError, OpsResult};
use crate::period::CostPeriod;
use crate::registry::{ActionRegistry, ActionSpec, ArgKind, Handler};
use crate::resolver::{Resolved, Resolver};

/// Atomically replaceable cloud client.
pub struct CloudHandle {
    inner: RwLock<Arc<dyn CloudApi>>,
}

impl CloudHandle {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            inner: RwLock::new(cloud),
        }
    }

    pub fn current(&self) -> Arc<dyn CloudApi> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new client, returning the old one.
    pub fn replace(&self, cloud: Arc<dyn CloudApi>) -> Arc<dyn CloudApi> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, cloud)
    }
}

/// An action whose resource arguments have been resolved to concrete IDs.
#[derive(Debug, Clone)]
pub struct PreparedAction {
    pub spec: ActionSpec,
    pub args: BTreeMap<String, String>,
    /// The resolved target of a single-resource action.
    pub target: Option<Resolved>,
    /// Operator-facing remarks gathered during resolution.
    pub notes: Vec<String>,
}

impl PreparedAction {
    fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    fn require(&self, name: &str) -> OpsResult<&str> {
        self.arg(name)
            .ok_or_else(|| OpsError::Validation(format!("missing argument '{name}'")))
    }

    /// Concrete identifier shown to the operator, e.g. `'web' (i-0abc…)`.
    pub fn target_label(&self) -> String {
        match &self.target {
            Some(t) => describe(&t.name, &t.reference.id),
            None => String::from("(no target)"),
        }
    }
}

/// Result of a dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Operator-facing text.
    pub summary: String,
    /// Resource created or affected, remembered by the session context.
    pub affected: Option<ResourceRef>,
    pub data: serde_json::Value,
}

pub struct ActionDispatcher {
    handle: CloudHandle,
    registry: Arc<ActionRegistry>,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(cloud: Arc<dyn CloudApi>, registry: Arc<ActionRegistry>, timeout: Duration) -> Self {
        Self {
            handle: CloudHandle::new(cloud),
            registry,
            timeout,
        }
    }

    pub fn cloud(&self) -> Arc<dyn CloudApi> {
        self.handle.current()
    }

    pub fn region(&self) -> String {
        self.handle.current().region().to_string()
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Replace the client (e.g. after a region switch).
    pub fn reconfigure(&self, cloud: Arc<dyn CloudApi>) {
        let new_region = cloud.region().to_string();
        let old = self.handle.replace(cloud);
        tracing::info!(from = old.region(), to = %new_region, "cloud client replaced");
    }

    /// Run one capability call under the dispatcher's timeout.
    pub async fn call<T>(&self, fut: impl Future<Output = CloudResult<T>>) -> OpsResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(OpsError::from),
            Err(_) => Err(OpsError::External(format!(
                "cloud call timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Resolve every resource-valued argument to a concrete ID.
    ///
    /// A required argument with no value fails `NotFound`; no call is
    /// ever made with an empty identifier.
    pub async fn prepare(
        &self,
        spec: &ActionSpec,
        args: BTreeMap<String, String>,
    ) -> OpsResult<PreparedAction> {
        let cloud = self.cloud();
        let resolver = Resolver::new(cloud.as_ref());
        let mut prepared = PreparedAction {
            spec: *spec,
            args,
            target: None,
            notes: Vec::new(),
        };

        for arg in spec.args {
            let ArgKind::Resource(kind) = arg.kind else {
                continue;
            };
            let Some(query) = prepared.args.get(arg.name).cloned() else {
                if arg.required {
                    return Err(self.missing(kind).await);
                }
                continue;
            };

            let resolved = match tokio::time::timeout(self.timeout, resolver.resolve(kind, &query))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(OpsError::External(format!(
                        "cloud call timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
            };

            if resolved.partial_match {
                prepared.notes.push(format!(
                    "Using {} as a partial match for '{query}'.",
                    describe(&resolved.name, &resolved.reference.id)
                ));
            }
            prepared
                .args
                .insert(arg.name.to_string(), resolved.reference.id.clone());
            if spec.target == Some(kind) && spec.target_arg() == Some(arg.name) {
                prepared.target = Some(resolved);
            }
        }

        Ok(prepared)
    }

    async fn missing(&self, kind: ResourceKind) -> OpsError {
        let cloud = self.cloud();
        let mut available: Vec<String> = match self.call(cloud.list_resources(kind)).await {
            Ok(resources) => resources
                .into_iter()
                .filter(|r| r.active && !r.name.is_empty())
                .map(|r| r.name)
                .collect(),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "could not list available resources");
                Vec::new()
            }
        };
        available.sort();
        available.dedup();
        OpsError::NotFound {
            kind,
            query: String::new(),
            available,
        }
    }

    pub async fn execute(&self, prepared: &PreparedAction) -> OpsResult<ActionOutcome> {
        let cloud = self.cloud();
        tracing::info!(action = prepared.spec.name, target = %prepared.target_label(), "dispatching action");

        match prepared.spec.handler {
            Handler::CreateNetwork => {
                let cidr = prepared.require("cidr")?;
                let network = self.call(cloud.create_network(cidr)).await?;
                Ok(created(
                    format!("Created network {} ({cidr}).", network.id),
                    network,
                ))
            }
            Handler::CreateSubnet => {
                let network_id = prepared.require("network_id")?;
                let cidr = prepared.require("cidr")?;
                let subnet = self
                    .call(cloud.create_subnet(network_id, cidr, prepared.arg("zone")))
                    .await?;
                Ok(created(
                    format!("Created subnet {} ({cidr}) in {network_id}.", subnet.id),
                    subnet,
                ))
            }
            Handler::CreateSecurityGroup => {
                let network_id = prepared.require("network_id")?;
                let group_name = prepared.require("name")?;
                let group = self
                    .call(cloud.create_security_group(network_id, group_name))
                    .await?;
                Ok(created(
                    format!(
                        "Created security group '{group_name}' ({}) in {network_id}.",
                        group.id
                    ),
                    group,
                ))
            }
            Handler::CreateInstance => self.create_instance(cloud.as_ref(), prepared).await,
            Handler::ListInstances => {
                let filter = InstanceFilter::parse_lenient(prepared.arg("filter").unwrap_or("all"));
                let rows = self.call(cloud.list_instances(filter)).await?;
                let summary = if rows.is_empty() {
                    String::from("No instances found.")
                } else {
                    let lines: Vec<String> = rows
                        .iter()
                        .map(|r| {
                            format!(
                                "- {} ({}) {} {} CPU {:.1}%",
                                display_name(&r.name),
                                r.id,
                                r.state,
                                r.size,
                                r.utilization
                            )
                        })
                        .collect();
                    format!(
                        "{} instance(s) in {}:\n{}",
                        rows.len(),
                        cloud.region(),
                        lines.join("\n")
                    )
                };
                Ok(ActionOutcome {
                    summary,
                    affected: None,
                    data: json!(rows),
                })
            }
            Handler::ListNetworks => {
                let networks = self.call(cloud.list_networks()).await?;
                let mut out = String::new();
                for n in &networks {
                    out.push_str(&format!("{} '{}' {}\n", n.id, display_name(&n.name), n.cidr));
                    for s in &n.subnets {
                        let zone = s.zone.as_deref().unwrap_or("-");
                        out.push_str(&format!("  └─ {} {} zone {zone}\n", s.id, s.cidr));
                        for i in &s.instance_ids {
                            out.push_str(&format!("      └─ {i}\n"));
                        }
                    }
                }
                if networks.is_empty() {
                    out.push_str("No networks found.");
                }
                Ok(ActionOutcome {
                    summary: out.trim_end().to_string(),
                    affected: None,
                    data: json!(networks),
                })
            }
            handler @ (Handler::Start | Handler::Stop | Handler::Reboot | Handler::Terminate) => {
                let id = prepared.require("instance_id")?;
                let (state, verb) = match handler {
                    Handler::Start => (self.call(cloud.start_instance(id)).await?, "Started"),
                    Handler::Stop => (self.call(cloud.stop_instance(id)).await?, "Stopped"),
                    Handler::Reboot => (self.call(cloud.reboot_instance(id)).await?, "Rebooted"),
                    _ => (
                        self.call(cloud.terminate_instance(id)).await?,
                        "Terminated",
                    ),
                };
                Ok(ActionOutcome {
                    summary: format!("{verb} {}: now {state}.", prepared.target_label()),
                    affected: Some(ResourceRef::instance(id)),
                    data: json!({ "instance_id": id, "state": state }),
                })
            }
            Handler::Resize => {
                let id = prepared.require("instance_id")?;
                let size = prepared.require("size")?;
                let rows = self.call(cloud.list_instances(InstanceFilter::All)).await?;
                let current = rows.iter().find(|r| r.id == id).map(|r| r.state);
                if current != Some(InstanceState::Stopped) {
                    let actual = current.map_or("unknown", InstanceState::as_str);
                    return Err(OpsError::Validation(format!(
                        "{} must be stopped before resizing (currently {actual})",
                        prepared.target_label()
                    )));
                }
                self.call(cloud.resize_instance(id, size)).await?;
                Ok(ActionOutcome {
                    summary: format!("Resized {} to {size}.", prepared.target_label()),
                    affected: Some(ResourceRef::instance(id)),
                    data: json!({ "instance_id": id, "size": size }),
                })
            }
            Handler::Snapshot => {
                let id = prepared.require("instance_id")?;
                let snapshot = self.call(cloud.create_snapshot(id)).await?;
                Ok(ActionOutcome {
                    summary: format!(
                        "Created snapshot {snapshot} of {}.",
                        prepared.target_label()
                    ),
                    affected: Some(ResourceRef::instance(id)),
                    data: json!({ "instance_id": id, "snapshot_id": snapshot }),
                })
            }
            Handler::Metric => {
                let id = prepared.require("instance_id")?;
                let metric = prepared.require("metric")?;
                let value = self.call(cloud.get_metric(id, metric)).await?;
                Ok(ActionOutcome {
                    summary: format!(
                        "{metric} for {}: {value:.1}{}",
                        prepared.target_label(),
                        metric_unit(metric)
                    ),
                    affected: Some(ResourceRef::instance(id)),
                    data: json!({ "instance_id": id, "metric": metric, "value": value }),
                })
            }
            Handler::Cost => self.cost_report(cloud.as_ref(), prepared).await,
        }
    }

    async fn create_instance(
        &self,
        cloud: &dyn CloudApi,
        prepared: &PreparedAction,
    ) -> OpsResult<ActionOutcome> {
        let subnet_id = match prepared.arg("subnet_id") {
            Some(id) => id.to_string(),
            None => self
                .call(cloud.list_resources(ResourceKind::Subnet))
                .await?
                .into_iter()
                .find(|s| s.active)
                .map(|s| s.id)
                .ok_or_else(|| {
                    OpsError::Validation("no subnet available, create a subnet first".into())
                })?,
        };
        let spec = InstanceSpec {
            image: prepared.require("image")?.to_string(),
            size: prepared.require("size")?.to_string(),
            subnet_id,
            security_group_id: prepared.arg("security_group_id").map(String::from),
            name: prepared.require("name")?.to_string(),
        };
        let instance = self.call(cloud.create_instance(&spec)).await?;
        Ok(ActionOutcome {
            summary: format!(
                "Launched instance '{}' ({}) size {} in {}.",
                spec.name, instance.id, spec.size, spec.subnet_id
            ),
            data: json!({ "instance_id": instance.id, "spec": spec }),
            affected: Some(instance),
        })
    }

    /// Spend for the window plus the change against the window of equal
    /// length just before it.
    async fn cost_report(
        &self,
        cloud: &dyn CloudApi,
        prepared: &PreparedAction,
    ) -> OpsResult<ActionOutcome> {
        let start = parse_date(prepared.require("start")?)?;
        let end = parse_date(prepared.require("end")?)?;
        if start > end {
            return Err(OpsError::Validation(format!(
                "cost window starts ({start}) after it ends ({end})"
            )));
        }
        let period = CostPeriod::new(start, end, format!("{start} to {end}"));
        let previous = period.previous_period();

        let current = self.call(cloud.get_cost(period.start, period.end)).await?;
        let before = self
            .call(cloud.get_cost(previous.start, previous.end))
            .await?;
        let delta = current - before;
        let change = if before > 0.0 {
            format!("{:+.1}%", delta / before * 100.0)
        } else {
            String::from("n/a")
        };

        Ok(ActionOutcome {
            summary: format!(
                "Cost {}: ${current:.2} (previous {} days ${before:.2}, change {delta:+.2} / {change}).",
                period.label,
                period.days()
            ),
            affected: None,
            data: json!({
                "start": start.to_string(),
                "end": end.to_string(),
                "amount": current,
                "previous_amount": before,
                "delta": delta,
            }),
        })
    }

    /// Execute a remediation decision. Only mutating decisions that the
    /// registry allows autonomously reach the cloud; advisory decisions
    /// return `None`.
    pub async fn execute_remediation(
        &self,
        action: RemediationAction,
        instance_id: &str,
    ) -> OpsResult<Option<InstanceState>> {
        let name = match action {
            RemediationAction::Start => "start_instance",
            RemediationAction::Reboot => "reboot_instance",
            RemediationAction::AdviseScaleUp
            | RemediationAction::ManualCheck
            | RemediationAction::None => return Ok(None),
        };
        if !self.registry.is_autonomous(name) {
            return Err(OpsError::Validation(format!(
                "{name} is not allowed without an operator"
            )));
        }

        let cloud = self.cloud();
        let state = match action {
            RemediationAction::Start => self.call(cloud.start_instance(instance_id)).await?,
            _ => self.call(cloud.reboot_instance(instance_id)).await?,
        };
        tracing::info!(action = name, instance_id, state = %state, "remediation executed");
        Ok(Some(state))
    }
}

fn created(summary: String, reference: ResourceRef) -> ActionOutcome {
    ActionOutcome {
        data: json!({ "kind": reference.kind, "id": reference.id }),
        summary,
        affected: Some(reference),
    }
}

fn parse_date(text: &str) -> OpsResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| OpsError::Validation(format!("'{text}' is not a YYYY-MM-DD date")))
}

/// Percentage metrics print with `%`; anything else prints bare.
fn metric_unit(metric: &str) -> &'static str {
    let lowered = metric.to_ascii_lowercase();
    if lowered.contains("utilization") || lowered.contains("cpu") || lowered.contains("percent") {
        "%"
    } else {
        ""
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(unnamed)" } else { name }
}

fn describe(name: &str, id: &str) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        format!("'{name}' ({id})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_cloud::MockCloud;

    fn setup() -> (Arc<MockCloud>, ActionDispatcher) {
        let cloud = Arc::new(MockCloud::with_sample_data("ap-northeast-2"));
        let dispatcher = ActionDispatcher::new(
            cloud.clone(),
            Arc::new(ActionRegistry::with_defaults()),
            Duration::from_secs(5),
        );
        (cloud, dispatcher)
    }

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn run(
        dispatcher: &ActionDispatcher,
        action: &str,
        pairs: &[(&str, &str)],
    ) -> OpsResult<ActionOutcome> {
        let spec = *dispatcher.registry().lookup(action).unwrap();
        let prepared = dispatcher.prepare(&spec, args(pairs)).await?;
        dispatcher.execute(&prepared).await
    }

    #[tokio::test]
    async fn stop_by_name_resolves_to_id() {
        let (cloud, dispatcher) = setup();
        let id = cloud.add_instance("api-gateway", InstanceState::Running, 10.0);

        let outcome = run(&dispatcher, "stop_instance", &[("instance_id", "api-gateway")])
            .await
            .unwrap();
        assert!(outcome.summary.contains(&id));
        assert_eq!(outcome.affected, Some(ResourceRef::instance(id.clone())));
        assert_eq!(cloud.instance(&id).unwrap().state, InstanceState::Stopped);
    }

    #[tokio::test]
    async fn partial_match_is_noted() {
        let (_cloud, dispatcher) = setup();
        let spec = *dispatcher.registry().lookup("get_metric").unwrap();
        let prepared = dispatcher
            .prepare(&spec, args(&[("instance_id", "batch"), ("metric", "cpu")]))
            .await
            .unwrap();
        assert_eq!(prepared.notes.len(), 1);
        assert!(prepared.notes[0].contains("batch-worker"));
        assert_eq!(prepared.target.as_ref().unwrap().name, "batch-worker");
    }

    #[tokio::test]
    async fn missing_required_target_is_not_found() {
        let (cloud, dispatcher) = setup();
        let err = run(&dispatcher, "terminate_instance", &[]).await.unwrap_err();
        match err {
            OpsError::NotFound {
                kind,
                query,
                available,
            } => {
                assert_eq!(kind, ResourceKind::Instance);
                assert!(query.is_empty());
                assert_eq!(
                    available,
                    vec!["AIOpsmake", "batch-worker", "web-server-prod"]
                );
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn missing_target_with_failed_listing_still_not_found() {
        let (cloud, dispatcher) = setup();
        cloud.fail_listing("api throttled");
        let err = run(&dispatcher, "stop_instance", &[]).await.unwrap_err();
        assert!(matches!(err, OpsError::NotFound { ref query, .. } if query.is_empty()));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn resize_running_instance_is_validation_error() {
        let (cloud, dispatcher) = setup();
        let err = run(
            &dispatcher,
            "resize_instance",
            &[("instance_id", "web-server-prod"), ("size", "t3.large")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OpsError::Validation(ref m) if m.contains("must be stopped")));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn resize_stopped_instance() {
        let (cloud, dispatcher) = setup();
        let outcome = run(
            &dispatcher,
            "resize_instance",
            &[("instance_id", "AIOpsmake"), ("size", "t3.large")],
        )
        .await
        .unwrap();
        let id = outcome.affected.unwrap().id;
        assert_eq!(cloud.instance(&id).unwrap().size, "t3.large");
    }

    #[tokio::test]
    async fn create_instance_uses_first_subnet() {
        let (cloud, dispatcher) = setup();
        let outcome = run(
            &dispatcher,
            "create_instance",
            &[("name", "web-02"), ("size", "t3.micro"), ("image", "ami-default")],
        )
        .await
        .unwrap();
        let id = outcome.affected.unwrap().id;
        assert_eq!(cloud.instance(&id).unwrap().name, "web-02");
    }

    #[tokio::test]
    async fn create_instance_without_subnet_is_validation_error() {
        let cloud = Arc::new(MockCloud::new("us-east-1"));
        let dispatcher = ActionDispatcher::new(
            cloud,
            Arc::new(ActionRegistry::with_defaults()),
            Duration::from_secs(5),
        );
        let err = run(
            &dispatcher,
            "create_instance",
            &[("name", "x"), ("size", "t3.micro"), ("image", "ami-default")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OpsError::Validation(_)));
    }

    #[tokio::test]
    async fn metric_unit_follows_metric() {
        let (_cloud, dispatcher) = setup();
        let outcome = run(&dispatcher, "get_metric", &[("instance_id", "web-server-prod")])
            .await
            .unwrap();
        assert!(outcome.summary.starts_with("CPUUtilization for "));
        assert!(outcome.summary.ends_with('%'));

        assert_eq!(metric_unit("cpu"), "%");
        assert_eq!(metric_unit("NetworkIn"), "");
        assert_eq!(metric_unit("DiskReadOps"), "");
    }

    #[tokio::test]
    async fn dispatch_follows_handler_not_alias() {
        let (cloud, dispatcher) = setup();
        let id = cloud.add_instance("api", InstanceState::Running, 10.0);
        let outcome = run(&dispatcher, "restart_instance", &[("instance_id", &id)])
            .await
            .unwrap();
        assert!(outcome.summary.starts_with("Rebooted"));
    }

    #[tokio::test]
    async fn cost_compares_previous_period() {
        let (_cloud, dispatcher) = setup();
        let outcome = run(
            &dispatcher,
            "get_cost",
            &[("start", "2025-06-01"), ("end", "2025-06-10")],
        )
        .await
        .unwrap();
        // 10 days at the mock's flat daily rate, both windows equal.
        assert_eq!(outcome.data["amount"], json!(32.0));
        assert_eq!(outcome.data["previous_amount"], json!(32.0));
        assert!(outcome.summary.contains("+0.0%"));
    }

    #[tokio::test]
    async fn cost_rejects_bad_dates() {
        let (_cloud, dispatcher) = setup();
        let err = run(
            &dispatcher,
            "get_cost",
            &[("start", "June"), ("end", "2025-06-10")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OpsError::Validation(_)));
    }

    #[tokio::test]
    async fn remediation_advisory_actions_do_not_touch_cloud() {
        let (cloud, dispatcher) = setup();
        let id = cloud.add_instance("hot", InstanceState::Running, 95.0);
        for action in [
            RemediationAction::AdviseScaleUp,
            RemediationAction::ManualCheck,
            RemediationAction::None,
        ] {
            assert_eq!(dispatcher.execute_remediation(action, &id).await, Ok(None));
        }
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn remediation_start_dispatches() {
        let (cloud, dispatcher) = setup();
        let id = cloud.add_instance("down", InstanceState::Stopped, 0.0);
        let state = dispatcher
            .execute_remediation(RemediationAction::Start, &id)
            .await
            .unwrap();
        assert_eq!(state, Some(InstanceState::Running));
        assert_eq!(cloud.mutating_calls().len(), 1);
    }

    #[tokio::test]
    async fn reconfigure_swaps_client() {
        let (_cloud, dispatcher) = setup();
        dispatcher.reconfigure(Arc::new(MockCloud::new("eu-west-1")));
        assert_eq!(dispatcher.region(), "eu-west-1");
        let outcome = run(&dispatcher, "list_instances", &[("filter", "all")])
            .await
            .unwrap();
        assert_eq!(outcome.summary, "No instances found.");
    }
}
