//! Health, readiness and metrics endpoints.

use super::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use beverage_inventor_resilience::BreakerState;
use serde::Serialize;
use std::collections::BTreeMap;

/// Component status in health bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Working
    Up,
    /// Not working
    Down,
}

impl From<bool> for ComponentStatus {
    fn from(up: bool) -> Self {
        if up { Self::Up } else { Self::Down }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Per-component status
    pub components: BTreeMap<&'static str, ComponentStatus>,
    /// Every breaker the registry has created
    pub breakers: BTreeMap<String, BreakerState>,
}

/// `GET /health`
///
/// 200 when the consumer is running and the breaker registry is reachable,
/// 503 otherwise. The body lists every breaker's state either way.
///
/// ```bash
/// curl localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","components":{"consumer":"up","registry":"up"},"breakers":{"ai":"closed"}}
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let consumer = state.consumer_running();
    let registry = state.registry.is_reachable();
    let healthy = consumer && registry;

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        components: BTreeMap::from([
            ("consumer", ComponentStatus::from(consumer)),
            ("registry", ComponentStatus::from(registry)),
        ]),
        breakers: state.registry.breaker_states().into_iter().collect(),
    };
    (status_code(healthy), Json(body))
}

/// Body of `GET /health/live`.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    /// Always `alive`
    pub status: &'static str,
}

/// `GET /health/live`
///
/// Always 200; only proves the process answers.
pub async fn liveness_check() -> (StatusCode, Json<LivenessResponse>) {
    (StatusCode::OK, Json(LivenessResponse { status: "alive" }))
}

/// Body of `GET /health/ready`.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Consumer is fetching
    pub consumer: bool,
    /// Breaker registry can be locked
    pub registry: bool,
}

/// `GET /health/ready`
///
/// 200 when the consumer is running and the registry is reachable.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let consumer = state.consumer_running();
    let registry = state.registry.is_reachable();
    let ready = consumer && registry;
    (
        status_code(ready),
        Json(ReadinessResponse {
            ready,
            consumer,
            registry,
        }),
    )
}

/// `GET /metrics` in Prometheus text format; 404 when metrics are disabled.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.as_ref().and_then(|m| m.render()) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

const fn status_code(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
