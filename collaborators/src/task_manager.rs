//! HTTP task-manager adapter.

use crate::http::{classify_status, classify_transport};
use async_trait::async_trait;
use beverage_inventor_core::ports::{TaskManager, TaskSpec};
use beverage_inventor_core::{CallContext, InventorError, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreatedTask {
    id: String,
}

/// Creates tasks with `POST {base_url}/tasks`, authenticated by bearer token.
///
/// The request body is the [`TaskSpec`] as JSON; the response must carry
/// the new task's `id`.
#[derive(Clone)]
pub struct HttpTaskManager {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTaskManager")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTaskManager {
    /// Adapter for the API at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl TaskManager for HttpTaskManager {
    async fn create_task(&self, ctx: &CallContext, task: &TaskSpec) -> Result<String> {
        let op = ctx.operation.as_str();
        let mut builder = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .json(task);
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }
        if !ctx.correlation_id.is_empty() {
            builder = builder.header("x-correlation-id", &ctx.correlation_id);
        }

        let response = builder.send().await.map_err(|e| classify_transport(op, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(op, status, &body));
        }

        let created: CreatedTask = response
            .json()
            .await
            .map_err(|e| InventorError::permanent_io(op, format!("unreadable task response: {e}")))?;
        tracing::debug!(operation = op, task_id = %created.id, "Task created");
        Ok(created.id)
    }
}
