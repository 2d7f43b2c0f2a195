//! Pipeline policy.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overall budget for one run in milliseconds; `None` for no budget
    pub deadline_ms: Option<u64>,
    /// An optimized recipe replaces the generated one only above this score
    pub adoption_threshold: f64,
    /// Run the three analyses concurrently
    pub concurrent_analysis: bool,
    /// Producer name on outbound events
    pub service_name: String,
    /// Notifier channel
    pub notification_channel: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: Some(120_000),
            adoption_threshold: 75.0,
            concurrent_analysis: true,
            service_name: "beverage-inventor-agent".to_string(),
            notification_channel: "#beverage-innovation".to_string(),
        }
    }
}

impl PipelineConfig {
    /// The run budget.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Check the values.
    ///
    /// # Errors
    ///
    /// A description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.deadline_ms == Some(0) {
            return Err("pipeline.deadline_ms must be positive".to_string());
        }
        if !(0.0..=100.0).contains(&self.adoption_threshold) {
            return Err(format!(
                "pipeline.adoption_threshold must be within 0-100, got {}",
                self.adoption_threshold
            ));
        }
        if self.service_name.trim().is_empty() {
            return Err("pipeline.service_name is empty".to_string());
        }
        if self.notification_channel.trim().is_empty() {
            return Err("pipeline.notification_channel is empty".to_string());
        }
        Ok(())
    }
}
