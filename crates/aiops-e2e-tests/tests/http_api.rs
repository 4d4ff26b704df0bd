//! E2E tests for the HTTP operator surface.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use aiops_agent::model::MockModel;
use aiops_cloud::MockCloud;
use aiops_protocol::InstanceState;

use helpers::{REGION, TestHarness};

#[tokio::test]
async fn e2e_health() {
    let h = TestHarness::with_sample_data(MockModel::always("{}"));
    let (status, json) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn e2e_chat_confirm_flag_gates_stop() {
    let cloud = MockCloud::new(REGION);
    let id = cloud.add_instance("AIOpsmake", InstanceState::Running, 12.0);
    let h = TestHarness::new(
        cloud,
        MockModel::always(r#"{"tool": "stop_instance", "args": {"instance_id": "AIOpsmake"}}"#),
    );

    let (status, json) = h
        .post("/api/v1/chat", json!({"text": "Stop AIOpsmake"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains(&id));
    assert!(h.cloud.mutating_calls().is_empty());

    let (status, json) = h
        .post(
            "/api/v1/chat",
            json!({"text": "Stop AIOpsmake", "confirm": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["reply"].as_str().unwrap().contains(&id));
    assert_eq!(h.cloud.instance(&id).unwrap().state, InstanceState::Stopped);
}

#[tokio::test]
async fn e2e_chat_unknown_target_is_404() {
    let h = TestHarness::with_sample_data(MockModel::always(
        r#"{"tool": "reboot_instance", "args": {"instance_id": "ghost"}}"#,
    ));

    let (status, json) = h
        .post("/api/v1/chat", json!({"text": "reboot ghost"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
    assert_eq!(json["category"], "not_found");
    assert!(json["error"].as_str().unwrap().contains("Available"));
}

#[tokio::test]
async fn e2e_context_reset_over_http() {
    let h = TestHarness::with_sample_data(MockModel::always("{}"));

    let (status, _) = h
        .post("/api/v1/chat", json!({"text": "cpu of batch-worker"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!h.ops.context_snapshot().is_empty());

    let (status, _) = h.post("/api/v1/context/reset", json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.ops.context_snapshot().is_empty());
}

#[tokio::test]
async fn e2e_monitor_start_and_stop() {
    let h = TestHarness::with_sample_data(MockModel::always(
        r#"{"action":"MANUAL_CHECK","root_cause":"x","reason":"y"}"#,
    ));

    let (status, json) = h.get("/api/v1/monitor").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);

    let (status, json) = h.post("/api/v1/monitor/start", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], true);

    let (status, _) = h.post("/api/v1/monitor/start", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = h.post("/api/v1/monitor/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);

    assert_eq!(
        h.notifier.sent()[0].title,
        "System Notification",
        "start announcement comes first"
    );
}
