//! Shared handler state.

use beverage_inventor_pipeline::Pipeline;
use beverage_inventor_resilience::ResilienceRegistry;
use beverage_inventor_resilience::metrics::MetricsServer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the handlers read. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// The invention pipeline
    pub pipeline: Arc<Pipeline>,
    /// Breakers and limiters, for health reporting
    pub registry: Arc<ResilienceRegistry>,
    /// `true` while the Redpanda consumer is fetching
    pub consumer_running: Arc<AtomicBool>,
    /// Prometheus recorder, when metrics are enabled
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// State without metrics.
    #[must_use]
    pub const fn new(
        pipeline: Arc<Pipeline>,
        registry: Arc<ResilienceRegistry>,
        consumer_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            consumer_running,
            metrics: None,
        }
    }

    /// Attach the metrics recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsServer>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether the consumer is fetching.
    #[must_use]
    pub fn consumer_running(&self) -> bool {
        self.consumer_running.load(Ordering::Acquire)
    }
}
