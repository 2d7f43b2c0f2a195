//! Slack incoming-webhook notifier.

use crate::http::{classify_status, classify_transport};
use async_trait::async_trait;
use beverage_inventor_core::ports::Notifier;
use beverage_inventor_core::{CallContext, Result};
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Posts `{channel, text}` to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The webhook URL is a credential.
        f.debug_struct("SlackNotifier").finish_non_exhaustive()
    }
}

impl SlackNotifier {
    /// Notifier posting to `webhook_url`.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send_message(&self, ctx: &CallContext, channel: &str, message: &str) -> Result<()> {
        let op = ctx.operation.as_str();
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { channel, text: message })
            .send()
            .await
            .map_err(|e| classify_transport(op, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(op, status, &body));
        }
        tracing::debug!(operation = op, channel, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use beverage_inventor_core::{DependencyKind, ErrorKind};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> CallContext {
        CallContext::new("notifier.send_message", DependencyKind::ExternalApi)
    }

    #[tokio::test]
    async fn test_posts_channel_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({"channel": "#beverage-innovation", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        SlackNotifier::new(format!("{}/hook", server.uri()))
            .send_message(&ctx(), "#beverage-innovation", "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_webhook_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let err = SlackNotifier::new(server.uri())
            .send_message(&ctx(), "#c", "hello")
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::PermanentIo);
        assert!(err.message.contains("no_service"));
    }
}
