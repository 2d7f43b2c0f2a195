//! Stand-ins used when no task manager or notifier is configured.
//!
//! Both log what would have been sent and succeed, so the pipeline's
//! fan-out stages behave the same with or without the external services.

use async_trait::async_trait;
use beverage_inventor_core::ports::{Notifier, TaskManager, TaskSpec};
use beverage_inventor_core::{CallContext, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs tasks and hands out local ids (`local-1`, `local-2`, ...).
#[derive(Debug, Default)]
pub struct LoggingTaskManager {
    next_id: AtomicU64,
}

impl LoggingTaskManager {
    /// New manager; ids start at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl TaskManager for LoggingTaskManager {
    async fn create_task(&self, ctx: &CallContext, task: &TaskSpec) -> Result<String> {
        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        tracing::info!(
            operation = %ctx.operation,
            task_id = %id,
            title = %task.title,
            "No task manager configured, task logged only"
        );
        Ok(id)
    }
}

/// Logs notifications instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_message(&self, ctx: &CallContext, channel: &str, message: &str) -> Result<()> {
        tracing::info!(operation = %ctx.operation, channel, message, "No notifier configured, message logged only");
        Ok(())
    }
}
