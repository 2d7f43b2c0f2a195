//! Topic routing and commit decisions for inbound messages.
//!
//! Nothing here touches the broker: an [`InboundMessage`] is a plain copy of
//! a fetched record, and [`Dispatcher::dispatch`] answers whether its offset
//! may be committed.

use async_trait::async_trait;
use beverage_inventor_core::event::{
    CONTENT_TYPE_JSON, IngredientDiscoveredEvent, RecipeRequestedEvent,
};
use beverage_inventor_core::{ErrorKind, InventorError, MessageHeaders, Request, Result};
use beverage_inventor_pipeline::Pipeline;
use beverage_inventor_resilience::metrics::EventBusMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default topic for recipe requests.
pub const DEFAULT_RECIPE_TOPIC: &str = "recipe.requests";

/// Default topic for ingredient discoveries.
pub const DEFAULT_INGREDIENT_TOPIC: &str = "ingredient.discovered";

/// A fetched record, detached from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Source topic
    pub topic: String,
    /// Source partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Raw payload
    pub payload: Option<Vec<u8>>,
    /// Raw headers
    pub headers: Vec<(String, Vec<u8>)>,
}

/// Something that turns a request into a beverage.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one request, finishing before `deadline` when one is given.
    async fn handle(&self, request: Request, deadline: Option<Instant>) -> Result<()>;
}

#[async_trait]
impl RequestHandler for Pipeline {
    async fn handle(&self, request: Request, deadline: Option<Instant>) -> Result<()> {
        let response = self.run_until(request, deadline).await?;
        tracing::info!(
            beverage_id = %response.beverage.id,
            name = %response.beverage.name,
            warnings = response.warnings.len(),
            "Inbound request produced a beverage"
        );
        Ok(())
    }
}

/// Topic names the consumer subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    /// `recipe.requests`
    pub recipe_requests: String,
    /// `ingredient.discovered`
    pub ingredient_discovered: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            recipe_requests: DEFAULT_RECIPE_TOPIC.to_string(),
            ingredient_discovered: DEFAULT_INGREDIENT_TOPIC.to_string(),
        }
    }
}

impl Topics {
    /// Both topics, for subscribing.
    #[must_use]
    pub fn all(&self) -> [&str; 2] {
        [&self.recipe_requests, &self.ingredient_discovered]
    }
}

/// What to do with a message's offset after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The message is finished with; commit past it
    Commit,
    /// Leave the offset uncommitted and deliver the message again
    Redeliver,
}

/// Commit rule for a handler failure.
///
/// Retryable kinds and unclassified internal errors keep the offset so the
/// message is delivered again. Any other classified failure, terminal or
/// not, is final for this message.
#[must_use]
pub fn disposition_for(err: &InventorError) -> Disposition {
    if err.is_retryable() || err.kind == ErrorKind::Internal {
        Disposition::Redeliver
    } else {
        Disposition::Commit
    }
}

/// Decodes inbound messages and hands the resulting requests to a handler.
pub struct Dispatcher {
    handler: Arc<dyn RequestHandler>,
    topics: Topics,
    deadline: Option<Duration>,
}

impl Dispatcher {
    /// Dispatch `topics` to `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn RequestHandler>, topics: Topics) -> Self {
        Self {
            handler,
            topics,
            deadline: None,
        }
    }

    /// Give every handled message a deadline of `deadline` from receipt.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Topics this dispatcher routes.
    #[must_use]
    pub const fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Decode `message`, run its request and decide on the offset.
    pub async fn dispatch(&self, message: &InboundMessage) -> Disposition {
        EventBusMetrics::record_consume(&message.topic);

        let request = match self.decode(message) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Message on unknown topic skipped"
                );
                return Disposition::Commit;
            }
            Err(err) => {
                EventBusMetrics::record_consume_error();
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    "Undecodable message skipped"
                );
                return Disposition::Commit;
            }
        };

        tracing::info!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            correlation_id = %request.correlation_id,
            theme = %request.theme,
            "Dispatching inbound request"
        );

        let deadline = self.deadline.map(|d| Instant::now() + d);
        match self.handler.handle(request, deadline).await {
            Ok(()) => Disposition::Commit,
            Err(err) => {
                let disposition = disposition_for(&err);
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    disposition = ?disposition,
                    "Inbound request failed"
                );
                disposition
            }
        }
    }

    /// `Ok(None)` for a topic this dispatcher does not route.
    fn decode(&self, message: &InboundMessage) -> Result<Option<Request>> {
        let is_recipe = message.topic == self.topics.recipe_requests;
        if !is_recipe && message.topic != self.topics.ingredient_discovered {
            return Ok(None);
        }

        let headers = MessageHeaders::from_pairs(
            message
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_slice())),
        )?;
        if !headers.content_type.starts_with(CONTENT_TYPE_JSON) {
            return Err(InventorError::invalid_request(
                "ingress.decode",
                format!("unsupported content type {}", headers.content_type),
            ));
        }
        let payload = message
            .payload
            .as_deref()
            .ok_or_else(|| InventorError::invalid_request("ingress.decode", "message has no payload"))?;

        let request = if is_recipe {
            serde_json::from_slice::<RecipeRequestedEvent>(payload)?.into_request()
        } else {
            serde_json::from_slice::<IngredientDiscoveredEvent>(payload)?.into_request()
        };
        Ok(Some(request))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("topics", &self.topics)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
