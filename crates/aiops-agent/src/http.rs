//! Optional HTTP surface over the operator path and the monitor.
//!
//! Confirmation cannot be interactive here, so a chat request carries an
//! explicit `confirm` flag that answers any critical-action prompt.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::OpsError;
use crate::monitor::{MonitorController, MonitorStatus};
use crate::ops::{ChatOps, render_error};
use crate::safety::PresetConfirmation;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub ops: Arc<ChatOps>,
    pub monitor: Arc<MonitorController>,
}

/// API error type that converts to a JSON response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An operator-path outcome; the body carries its category.
    #[error("{}", render_error(.0))]
    Ops(OpsError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Ops(err) => match err {
                OpsError::NotFound { .. } => StatusCode::NOT_FOUND,
                OpsError::Ambiguous { .. } | OpsError::Aborted { .. } => StatusCode::CONFLICT,
                OpsError::UnrecognizedIntent(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OpsError::Validation(_) => StatusCode::BAD_REQUEST,
                OpsError::External(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn category(&self) -> &'static str {
        match self {
            ApiError::Ops(err) => err.category(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
        }
    }
}

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        ApiError::Ops(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.to_string(),
            "category": self.category(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    /// Answer to any confirmation prompt. Absent means no.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/v1/chat
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    let confirmation = PresetConfirmation::new(req.confirm);
    let reply = state.ops.handle(&req.text, &confirmation).await?;
    Ok(Json(ChatReply { reply }))
}

/// POST /api/v1/context/reset
async fn reset_context(State(state): State<AppState>) -> StatusCode {
    state.ops.reset_context();
    StatusCode::NO_CONTENT
}

/// GET /api/v1/monitor
async fn monitor_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status().await)
}

/// POST /api/v1/monitor/start
async fn monitor_start(State(state): State<AppState>) -> ApiResult<Json<MonitorStatus>> {
    if !state.monitor.start().await {
        return Err(ApiError::Conflict("monitor is already running".into()));
    }
    Ok(Json(state.monitor.status().await))
}

/// POST /api/v1/monitor/stop
async fn monitor_stop(State(state): State<AppState>) -> ApiResult<Json<MonitorStatus>> {
    if !state.monitor.stop().await {
        return Err(ApiError::Conflict("monitor is not running".into()));
    }
    Ok(Json(state.monitor.status().await))
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/chat", post(chat))
        .route("/context/reset", post(reset_context))
        .route("/monitor", get(monitor_status))
        .route("/monitor/start", post(monitor_start))
        .route("/monitor/stop", post(monitor_stop));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::MonitorConfig;
    use crate::dispatcher::ActionDispatcher;
    use crate::inference::RuleBasedEngine;
    use crate::model::MockModel;
    use crate::monitor::RemediationLoop;
    use crate::registry::ActionRegistry;
    use aiops_cloud::MockCloud;
    use aiops_guidelines::MockRetriever;
    use aiops_notify::MockNotifier;

    fn test_state(cloud: Arc<MockCloud>) -> AppState {
        let dispatcher = Arc::new(ActionDispatcher::new(
            cloud,
            Arc::new(ActionRegistry::with_defaults()),
            Duration::from_secs(5),
        ));
        let ops = Arc::new(ChatOps::new(
            Box::new(RuleBasedEngine::new()),
            dispatcher.clone(),
        ));
        let remediation = Arc::new(RemediationLoop::new(
            dispatcher,
            Arc::new(MockRetriever::with_sample()),
            Arc::new(MockModel::always(r#"{"action": "MANUAL_CHECK"}"#)),
            Arc::new(MockNotifier::new()),
            MonitorConfig::default(),
        ));
        AppState {
            ops,
            monitor: Arc::new(MonitorController::new(remediation)),
        }
    }

    fn app() -> (Router, Arc<MockCloud>) {
        let cloud = Arc::new(MockCloud::with_sample_data("ap-northeast-2"));
        (build_router(test_state(cloud.clone())), cloud)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_lists_instances() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/api/v1/chat", json!({"text": "list instances"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["reply"].as_str().unwrap().contains("web-server-prod"));
    }

    #[tokio::test]
    async fn critical_action_without_confirm_is_conflict() {
        let (app, cloud) = app();
        let id = cloud.add_instance("scratch", aiops_protocol::InstanceState::Running, 5.0);
        let response = app
            .oneshot(post_json(
                "/api/v1/chat",
                json!({"text": format!("terminate {id}")}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["status"], 409);
        assert!(json["error"].as_str().unwrap().contains("Cancelled"));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn critical_action_with_confirm_runs() {
        let (app, cloud) = app();
        let id = cloud.add_instance("scratch", aiops_protocol::InstanceState::Running, 5.0);
        let response = app
            .oneshot(post_json(
                "/api/v1/chat",
                json!({"text": format!("stop {id}"), "confirm": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            cloud.instance(&id).unwrap().state,
            aiops_protocol::InstanceState::Stopped
        );
    }

    #[tokio::test]
    async fn unrecognized_text_is_unprocessable() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/api/v1/chat", json!({"text": "sing me a song"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn empty_text_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/api/v1/chat", json!({"text": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn context_reset_returns_no_content() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::post("/api/v1/context/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn monitor_status_starts_idle() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/v1/monitor").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["running"], false);
        assert_eq!(json["interval_secs"], 30);
    }

    #[tokio::test]
    async fn stopping_idle_monitor_is_conflict() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::post("/api/v1/monitor/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn ops_error_status_mapping() {
        let cases = [
            (OpsError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (OpsError::External("down".into()), StatusCode::BAD_GATEWAY),
            (
                OpsError::UnrecognizedIntent("?".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn error_body_carries_category() {
        let response = ApiError::from(OpsError::Aborted {
            action: "stop_instance".into(),
            target: "i-0123456789abcdef0".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["category"], "aborted");
        assert_eq!(json["status"], 409);

        let json = body_json(ApiError::BadRequest("empty".into()).into_response()).await;
        assert_eq!(json["category"], "bad_request");
    }
}
