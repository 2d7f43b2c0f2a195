//! Warning bookkeeping.

use beverage_inventor_core::Response;
use beverage_inventor_resilience::metrics::PipelineMetrics;

/// Append a warning raised by `stage`, logging and counting it.
pub(crate) fn warn(response: &mut Response, stage: &'static str, message: impl Into<String>) {
    let message = message.into();
    tracing::warn!(stage, beverage_id = %response.beverage.id, warning = %message, "Pipeline stage degraded");
    PipelineMetrics::record_warning(stage);
    response.warnings.push(message);
}
