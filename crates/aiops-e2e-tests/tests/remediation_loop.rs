//! E2E tests for the scan → diagnose → decide → execute → report loop.

mod helpers;

use aiops_agent::model::MockModel;
use aiops_cloud::MockCloud;
use aiops_protocol::{IncidentTier, InstanceState, RemediationAction};

use helpers::{REGION, TestHarness};

const MANUAL_CHECK: &str = r#"{"action":"MANUAL_CHECK","root_cause":"x","reason":"y"}"#;

#[tokio::test]
async fn e2e_stopped_row_is_one_critical_incident() {
    let cloud = MockCloud::new(REGION);
    cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    let h = TestHarness::new(cloud, MockModel::always(MANUAL_CHECK));

    let report = h.remediation.tick().await;

    assert_eq!(report.scanned, 1);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].incident.tier, IncidentTier::Critical);
    assert_eq!(h.retriever.queries().len(), 1);
    assert_eq!(h.model.call_count(), 1);
}

#[tokio::test]
async fn e2e_utilization_threshold_is_strict() {
    let cloud = MockCloud::new(REGION);
    let hot = cloud.add_instance("hot", InstanceState::Running, 81.0);
    cloud.add_instance("warm", InstanceState::Running, 79.9);
    let h = TestHarness::new(cloud, MockModel::always(MANUAL_CHECK));

    let report = h.remediation.tick().await;

    assert_eq!(report.scanned, 2);
    assert_eq!(report.outcomes.len(), 1);
    let incident = &report.outcomes[0].incident;
    assert_eq!(incident.tier, IncidentTier::Warning);
    assert_eq!(incident.resource_id, hot);
    assert_eq!(incident.trigger, "High CPU (81.0%)");
}

#[tokio::test]
async fn e2e_manual_check_mutates_nothing_and_notifies_once() {
    let cloud = MockCloud::new(REGION);
    cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    let h = TestHarness::new(cloud, MockModel::always(MANUAL_CHECK));

    let report = h.remediation.tick().await;

    let outcome = &report.outcomes[0];
    assert_eq!(
        outcome.decision.as_ref().map(|d| d.action),
        Some(RemediationAction::ManualCheck)
    );
    assert!(!outcome.executed);
    assert!(h.cloud.mutating_calls().is_empty());
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn e2e_negated_start_is_never_start() {
    let cloud = MockCloud::new(REGION);
    let id = cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    let h = TestHarness::new(
        cloud,
        MockModel::always("The disk is full. Do not start the instance until it is cleaned up."),
    );

    let report = h.remediation.tick().await;

    let action = report.outcomes[0].decision.as_ref().map(|d| d.action);
    assert_ne!(action, Some(RemediationAction::Start));
    assert!(h.cloud.mutating_calls().is_empty());
    assert_eq!(h.cloud.instance(&id).unwrap().state, InstanceState::Stopped);
}

#[tokio::test]
async fn e2e_start_decision_recovers_instance() {
    let cloud = MockCloud::new(REGION);
    let id = cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    let h = TestHarness::new(
        cloud,
        MockModel::always(r#"{"action":"START","root_cause":"stopped by schedule","reason":"service down"}"#),
    );

    let report = h.remediation.tick().await;

    assert!(report.outcomes[0].executed);
    assert_eq!(h.cloud.instance(&id).unwrap().state, InstanceState::Running);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].title.contains("Service Outage"));
    assert!(sent[0].title.contains("AIOpsmake"));
    assert!(sent[0].body.contains("START"));
}

#[tokio::test]
async fn e2e_loop_never_touches_operator_context() {
    let cloud = MockCloud::new(REGION);
    cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    let h = TestHarness::new(
        cloud,
        MockModel::always(r#"{"action":"START","root_cause":"x","reason":"y"}"#),
    );

    h.remediation.tick().await;
    assert!(h.ops.context_snapshot().is_empty());
}

#[tokio::test]
async fn e2e_listing_failure_ends_tick_quietly() {
    let cloud = MockCloud::new(REGION);
    cloud.add_instance("AIOpsmake", InstanceState::Stopped, 0.0);
    cloud.fail_listing("throttled");
    let h = TestHarness::new(cloud, MockModel::always(MANUAL_CHECK));

    let report = h.remediation.tick().await;

    assert!(report.outcomes.is_empty());
    assert!(report.scan_error.is_some());
    assert_eq!(h.model.call_count(), 0);
    assert!(h.notifier.sent().is_empty());
}
