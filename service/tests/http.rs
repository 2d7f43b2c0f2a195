//! HTTP routes against an in-process pipeline.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use beverage_inventor::app;
use beverage_inventor::config::ServiceConfig;
use beverage_inventor::http::{self, AppState};
use beverage_inventor_collaborators::InMemoryBeverageRepository;
use beverage_inventor_core::{DependencyKind, EventType};
use beverage_inventor_pipeline::Pipeline;
use beverage_inventor_resilience::{Executor, ResilienceRegistry};
use beverage_inventor_testing::RecordingPublisher;
use beverage_inventor_testing::fixtures::fast_registry;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    publisher: Arc<RecordingPublisher>,
    registry: Arc<ResilienceRegistry>,
    running: Arc<AtomicBool>,
}

impl TestApp {
    fn new() -> Self {
        let publisher = Arc::new(RecordingPublisher::new());
        let registry = fast_registry();
        let env = app::environment(
            &ServiceConfig::default(),
            publisher.clone(),
            Arc::new(InMemoryBeverageRepository::new()),
        );
        let pipeline = Pipeline::new(
            env,
            Executor::new(Arc::clone(&registry)),
            ServiceConfig::default().pipeline,
        );
        let running = Arc::new(AtomicBool::new(true));
        let state = AppState::new(Arc::new(pipeline), Arc::clone(&registry), Arc::clone(&running));

        Self {
            router: http::router(state),
            publisher,
            registry,
            running,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: Method, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn invent(&self) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/invent",
                &json!({
                    "ingredients": ["espresso", "whole milk"],
                    "theme": "comfort",
                    "created_by": "u1"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

#[tokio::test]
async fn test_invent_returns_response() {
    let app = TestApp::new();
    let body = app.invent().await;

    assert!(!body["beverage"]["name"].as_str().unwrap().is_empty());
    assert_eq!(body["beverage"]["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["ai_used"], false);
    let events = app.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::BeverageCreated);
}

#[tokio::test]
async fn test_invent_uses_correlation_header() {
    let app = TestApp::new();
    let request = Request::post("/invent")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Correlation-ID", "req-77")
        .body(Body::from(
            json!({"ingredients": ["green tea"], "theme": "calm", "created_by": "u2", "request_id": "body-id"})
                .to_string(),
        ))
        .unwrap();

    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let event = &app.publisher.events()[0];
    assert_eq!(event.beverage.created_by, "u2");
}

#[tokio::test]
async fn test_invalid_request_is_400() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/invent",
            &json!({"ingredients": [], "theme": "comfort", "created_by": "u1"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["operation"].is_string());
    assert!(body["message"].is_string());
    assert!(app.publisher.events().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = TestApp::new();
    let request = Request::post("/invent")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_bad_objective_weights_are_400() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/invent",
            &json!({
                "ingredients": ["espresso"],
                "theme": "comfort",
                "created_by": "u1",
                "optimization_goals": {
                    "weights": {"taste": 0.4, "cost": 0.3, "nutrition": 0.2, "compatibility": 0.12}
                }
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_objectives");
}

#[tokio::test]
async fn test_get_and_list_beverages() {
    let app = TestApp::new();
    let created = app.invent().await;
    let id = created["beverage"]["id"].as_str().unwrap();

    let (status, body) = app.get(&format!("/beverages/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = app.get("/beverages?theme=comfort&status=draft").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.get("/beverages?creator=someone-else").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_beverage_is_404() {
    let app = TestApp::new();
    let (status, body) = app
        .get("/beverages/7f9c24e8-3b12-4fef-91e0-1a2b3c4d5e6f")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_malformed_id_is_400() {
    let app = TestApp::new();
    let (status, body) = app.get("/beverages/not-a-uuid").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_status_filter_is_400() {
    let app = TestApp::new();
    let (status, body) = app.get("/beverages?status=retired").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_status_update() {
    let app = TestApp::new();
    let created = app.invent().await;
    let id = created["beverage"]["id"].as_str().unwrap();
    let uri = format!("/beverages/{id}/status");

    let (status, body) = app.json(Method::PUT, &uri, &json!({"status": "pending"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let events = app.publisher.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type, EventType::BeverageStatusChanged);

    let (status, body) = app.json(Method::PUT, &uri, &json!({"status": "production"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_standalone_analysis() {
    let app = TestApp::new();
    let created = app.invent().await;
    let id = created["beverage"]["id"].as_str().unwrap();

    let (status, body) = app.get(&format!("/beverages/{id}/analysis?level=basic")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["beverage"]["id"], id);
    assert!(body["cost_analysis"].is_object());
    assert_eq!(app.publisher.events().len(), 1);
}

#[tokio::test]
async fn test_open_circuit_is_503_with_retry_after() {
    let app = TestApp::new();
    let breaker = app.registry.breaker("repository", DependencyKind::Database);
    for _ in 0..5 {
        breaker.try_acquire().unwrap().failure();
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/beverages/7f9c24e8-3b12-4fef-91e0-1a2b3c4d5e6f")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "circuit_open");
}

#[tokio::test]
async fn test_health_follows_consumer_state() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["consumer"], "up");

    app.running.store(false, Ordering::Release);

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["components"]["consumer"], "down");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    let (status, body) = app.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_health_reports_breaker_states() {
    let app = TestApp::new();
    app.invent().await;

    let (_, body) = app.get("/health").await;

    assert_eq!(body["breakers"]["repository"], "closed");
    assert_eq!(body["breakers"]["event_bus"], "closed");
}

#[tokio::test]
async fn test_metrics_disabled_is_404() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
