//! Shared test harness for the scenario tests.
//!
//! Wires the real operator path, remediation loop and HTTP router over
//! the in-memory cloud, a scripted model, a mock retriever and a
//! recording notifier.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use aiops_agent::config::MonitorConfig;
use aiops_agent::dispatcher::ActionDispatcher;
use aiops_agent::http::{AppState, build_router};
use aiops_agent::inference::{LlmEngine, RuleBasedEngine, TieredEngine};
use aiops_agent::model::MockModel;
use aiops_agent::monitor::{MonitorController, RemediationLoop};
use aiops_agent::ops::ChatOps;
use aiops_agent::registry::ActionRegistry;
use aiops_cloud::MockCloud;
use aiops_guidelines::MockRetriever;
use aiops_notify::MockNotifier;

pub const REGION: &str = "ap-northeast-2";

pub struct TestHarness {
    pub cloud: Arc<MockCloud>,
    pub model: Arc<MockModel>,
    pub retriever: Arc<MockRetriever>,
    pub notifier: Arc<MockNotifier>,
    pub ops: Arc<ChatOps>,
    pub remediation: Arc<RemediationLoop>,
    pub monitor: Arc<MonitorController>,
    pub router: Router,
}

impl TestHarness {
    /// Harness over `cloud`, with `model` answering both routing and
    /// remediation prompts.
    pub fn new(cloud: MockCloud, model: MockModel) -> Self {
        let cloud = Arc::new(cloud);
        let model = Arc::new(model);
        let retriever = Arc::new(MockRetriever::with_sample());
        let notifier = Arc::new(MockNotifier::new());
        let registry = Arc::new(ActionRegistry::with_defaults());

        let dispatcher = Arc::new(ActionDispatcher::new(
            cloud.clone(),
            registry.clone(),
            Duration::from_secs(5),
        ));
        let engine = TieredEngine::new(
            Box::new(RuleBasedEngine::new()),
            Box::new(LlmEngine::new(model.clone(), registry)),
        );
        let ops = Arc::new(ChatOps::new(Box::new(engine), dispatcher.clone()));
        let remediation = Arc::new(RemediationLoop::new(
            dispatcher,
            retriever.clone(),
            model.clone(),
            notifier.clone(),
            MonitorConfig::default(),
        ));
        let monitor = Arc::new(MonitorController::new(remediation.clone()));
        let router = build_router(AppState {
            ops: ops.clone(),
            monitor: monitor.clone(),
        });

        Self {
            cloud,
            model,
            retriever,
            notifier,
            ops,
            remediation,
            monitor,
            router,
        }
    }

    /// Sample inventory (web-server-prod, batch-worker, stopped AIOpsmake).
    pub fn with_sample_data(model: MockModel) -> Self {
        Self::new(MockCloud::with_sample_data(REGION), model)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}
