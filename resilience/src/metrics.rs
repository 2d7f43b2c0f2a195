//! Prometheus metrics for observability and monitoring.
//!
//! Metric families cover:
//! - Circuit breaker state and outcomes, labelled by breaker name
//! - Retry attempts and exhaustion, labelled by operation
//! - Rate limiter admissions, labelled by dependency kind
//! - Pipeline runs and stage degradations
//! - Event bus publish and consume
//!
//! Recording is a no-op until a recorder is installed, so the recorders can
//! be called freely from tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use beverage_inventor_resilience::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use crate::circuit_breaker::State;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
///
/// The HTTP surface renders [`MetricsServer::render`] on `GET /metrics`.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 90.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed, scrape /metrics");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the HTTP surface serves metrics on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Circuit Breaker Metrics
    describe_gauge!(
        "circuit_breaker_state",
        "Current circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!("circuit_breaker_calls_total", "Total number of admission checks");
    describe_counter!("circuit_breaker_successes_total", "Total number of successful calls");
    describe_counter!("circuit_breaker_failures_total", "Total number of failed calls");
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Total number of rejected calls (circuit open)"
    );

    // Retry Metrics
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!("retry_successes_total", "Total number of operations that succeeded after a retry");
    describe_counter!("retry_exhausted_total", "Total number of operations that exhausted their attempts");

    // Rate Limiter Metrics
    describe_counter!("rate_limiter_allowed_total", "Total number of admitted acquires");
    describe_counter!("rate_limiter_rejected_total", "Total number of rejected acquires");
    describe_gauge!("rate_limiter_waiting", "Callers currently waiting for a permit");

    // Pipeline Metrics
    describe_counter!("pipeline_runs_total", "Total number of pipeline runs, by outcome");
    describe_counter!("pipeline_warnings_total", "Total number of non-terminal stage degradations");
    describe_histogram!("pipeline_duration_seconds", "Time taken by a pipeline run");

    // Event Bus Metrics
    describe_counter!("event_bus_messages_published_total", "Total number of events published");
    describe_counter!("event_bus_publish_errors_total", "Total number of publish errors");
    describe_counter!("event_bus_messages_consumed_total", "Total number of messages consumed, by topic");
    describe_counter!("event_bus_consume_errors_total", "Total number of consume errors");
    describe_counter!("event_bus_offsets_committed_total", "Total number of offsets committed, by topic");
    describe_histogram!("event_bus_publish_duration_seconds", "Time taken to publish events");
}

/// Circuit breaker metrics recorder.
pub struct BreakerMetrics;

impl BreakerMetrics {
    /// Record an admission check.
    pub fn record_call(breaker: &str) {
        counter!("circuit_breaker_calls_total", "breaker" => breaker.to_owned()).increment(1);
    }

    /// Record a success.
    pub fn record_success(breaker: &str) {
        counter!("circuit_breaker_successes_total", "breaker" => breaker.to_owned()).increment(1);
    }

    /// Record a counted failure.
    pub fn record_failure(breaker: &str) {
        counter!("circuit_breaker_failures_total", "breaker" => breaker.to_owned()).increment(1);
    }

    /// Record a rejection.
    pub fn record_rejection(breaker: &str) {
        counter!("circuit_breaker_rejections_total", "breaker" => breaker.to_owned()).increment(1);
    }

    /// Record a state transition.
    pub fn record_state(breaker: &str, state: State) {
        gauge!("circuit_breaker_state", "breaker" => breaker.to_owned()).set(state.as_gauge());
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry (not the first attempt).
    pub fn record_attempt(operation: &str) {
        counter!("retry_attempts_total", "operation" => operation.to_owned()).increment(1);
    }

    /// Record success after at least one retry.
    pub fn record_success(operation: &str) {
        counter!("retry_successes_total", "operation" => operation.to_owned()).increment(1);
    }

    /// Record exhaustion.
    pub fn record_exhausted(operation: &str) {
        counter!("retry_exhausted_total", "operation" => operation.to_owned()).increment(1);
    }
}

/// Rate limiter metrics recorder.
pub struct LimiterMetrics;

impl LimiterMetrics {
    /// Record an admitted acquire.
    pub fn record_allowed(limiter: &str) {
        counter!("rate_limiter_allowed_total", "limiter" => limiter.to_owned()).increment(1);
    }

    /// Record a rejected acquire.
    pub fn record_rejected(limiter: &str) {
        counter!("rate_limiter_rejected_total", "limiter" => limiter.to_owned()).increment(1);
    }

    /// Record the number of waiting callers.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_waiting(limiter: &str, waiting: u64) {
        gauge!("rate_limiter_waiting", "limiter" => limiter.to_owned()).set(waiting as f64);
    }
}

/// Pipeline metrics recorder.
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record a finished run; `outcome` is `ok` or an error kind.
    pub fn record_run(outcome: &'static str, duration: Duration) {
        counter!("pipeline_runs_total", "outcome" => outcome).increment(1);
        histogram!("pipeline_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a degraded stage.
    pub fn record_warning(stage: &'static str) {
        counter!("pipeline_warnings_total", "stage" => stage).increment(1);
    }
}

/// Event bus metrics recorder.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// Record a message publish.
    pub fn record_publish(duration: Duration) {
        counter!("event_bus_messages_published_total").increment(1);
        histogram!("event_bus_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a publish error.
    pub fn record_publish_error() {
        counter!("event_bus_publish_errors_total").increment(1);
    }

    /// Record a message consumption.
    pub fn record_consume(topic: &str) {
        counter!("event_bus_messages_consumed_total", "topic" => topic.to_owned()).increment(1);
    }

    /// Record an offset commit.
    pub fn record_commit(topic: &str) {
        counter!("event_bus_offsets_committed_total", "topic" => topic.to_owned()).increment(1);
    }

    /// Record a consume error.
    pub fn record_consume_error() {
        counter!("event_bus_consume_errors_total").increment(1);
    }
}
