//! HTTP surface.
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /invent` | [`handlers::invent`] |
//! | `GET /beverages` | [`handlers::list_beverages`] |
//! | `GET /beverages/:id` | [`handlers::get_beverage`] |
//! | `PUT /beverages/:id/status` | [`handlers::update_status`] |
//! | `GET /beverages/:id/analysis` | [`handlers::analyze_beverage`] |
//! | `GET /health`, `/health/live`, `/health/ready` | [`health`] |
//! | `GET /metrics` | [`health::metrics`] |

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invent", post(handlers::invent))
        .route("/beverages", get(handlers::list_beverages))
        .route("/beverages/:id", get(handlers::get_beverage))
        .route("/beverages/:id/status", put(handlers::update_status))
        .route("/beverages/:id/analysis", get(handlers::analyze_beverage))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the dedicated metrics listener.
pub fn metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(health::metrics))
        .with_state(state)
}
