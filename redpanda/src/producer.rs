//! Event egress.

use crate::error::ProducerError;
use crate::security::KafkaSecurity;
use async_trait::async_trait;
use beverage_inventor_core::ports::EventPublisher;
use beverage_inventor_core::{BeverageEvent, CallContext, Result};
use beverage_inventor_resilience::metrics::EventBusMetrics;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio::time::Instant;

/// Default output topic.
pub const DEFAULT_OUTPUT_TOPIC: &str = "beverage.events";

/// Publishes [`BeverageEvent`] envelopes to a single topic.
///
/// Messages are JSON, keyed by the beverage id, and carry the
/// `content-type`, `timestamp` and `producer` headers. Retries, timeouts and
/// the circuit breaker are the caller's concern; this type makes exactly
/// one delivery attempt per call.
///
/// # Example
///
/// ```no_run
/// use beverage_inventor_redpanda::RedpandaPublisher;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let publisher = RedpandaPublisher::builder()
///     .brokers("localhost:9092")
///     .topic("beverage.events")
///     .acks("all")
///     .batch_timeout(Duration::from_millis(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl RedpandaPublisher {
    /// Start a builder.
    #[must_use]
    pub fn builder() -> RedpandaPublisherBuilder {
        RedpandaPublisherBuilder::default()
    }

    /// Destination topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for every queued message to be delivered.
    ///
    /// # Errors
    ///
    /// [`ProducerError::Flush`] if messages are still queued after `timeout`.
    pub fn flush(&self, timeout: Duration) -> std::result::Result<(), ProducerError> {
        self.producer.flush(Timeout::After(timeout)).map_err(ProducerError::Flush)
    }

    /// Fetch cluster metadata, returning the number of brokers seen.
    ///
    /// Blocks for up to `timeout`; call it at startup only.
    ///
    /// # Errors
    ///
    /// [`ProducerError::Unreachable`] if no broker answered in time.
    pub fn probe(&self, timeout: Duration) -> std::result::Result<usize, ProducerError> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(None, Timeout::After(timeout))
            .map_err(ProducerError::Unreachable)?;
        Ok(metadata.brokers().len())
    }

    fn queue_timeout(&self, ctx: &CallContext) -> Duration {
        ctx.deadline
            .map_or(self.timeout, |deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl std::fmt::Debug for RedpandaPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaPublisher")
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublisher for RedpandaPublisher {
    async fn publish_event(&self, ctx: &CallContext, event: &BeverageEvent) -> Result<()> {
        let payload = event.encode()?;
        let key = event.key();
        let headers = event
            .headers()
            .to_pairs()
            .iter()
            .fold(OwnedHeaders::new_with_capacity(3), |headers, (name, value)| {
                headers.insert(Header {
                    key: name,
                    value: Some(value.as_str()),
                })
            });

        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&key)
            .headers(headers);

        let started = Instant::now();
        match self.producer.send(record, Timeout::After(self.queue_timeout(ctx))).await {
            Ok((partition, offset)) => {
                EventBusMetrics::record_publish(started.elapsed());
                tracing::debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    event_type = event.event_type.as_str(),
                    beverage_id = %event.beverage_id,
                    correlation_id = %ctx.correlation_id,
                    "Event published"
                );
                Ok(())
            }
            Err((source, _)) => {
                EventBusMetrics::record_publish_error();
                tracing::error!(
                    topic = %self.topic,
                    event_type = event.event_type.as_str(),
                    beverage_id = %event.beverage_id,
                    error = %source,
                    "Failed to publish event"
                );
                Err(ProducerError::Delivery {
                    topic: self.topic.clone(),
                    source,
                }
                .into())
            }
        }
    }
}

/// Builder for [`RedpandaPublisher`].
#[derive(Debug, Default)]
pub struct RedpandaPublisherBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    acks: Option<String>,
    batch_timeout: Option<Duration>,
    compression: Option<String>,
    timeout: Option<Duration>,
    security: KafkaSecurity,
}

impl RedpandaPublisherBuilder {
    /// Comma-separated broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Output topic. Default: `beverage.events`.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Required acknowledgements: `"0"`, `"1"` or `"all"`. Default: `"all"`.
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// How long to wait for a batch to fill (`linger.ms`). Default: 10 ms.
    #[must_use]
    pub const fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = Some(timeout);
        self
    }

    /// Compression codec. Default: `"none"`.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Upper bound on queueing plus delivery when the caller sets no deadline.
    /// Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// TLS / SASL settings.
    #[must_use]
    pub fn security(mut self, security: KafkaSecurity) -> Self {
        self.security = security;
        self
    }

    /// Create the producer.
    ///
    /// # Errors
    ///
    /// [`ProducerError::MissingBrokers`] without brokers,
    /// [`ProducerError::Create`] if the client rejects the configuration.
    pub fn build(self) -> std::result::Result<RedpandaPublisher, ProducerError> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or(ProducerError::MissingBrokers)?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let linger = self.batch_timeout.unwrap_or(Duration::from_millis(10));
        let acks = self.acks.unwrap_or_else(|| "all".to_string());
        let compression = self.compression.unwrap_or_else(|| "none".to_string());

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("linger.ms", linger.as_millis().to_string())
            .set("acks", &acks)
            .set("compression.type", &compression);
        self.security.apply(&mut config);

        let producer: FutureProducer = config.create().map_err(ProducerError::Create)?;
        let topic = self.topic.unwrap_or_else(|| DEFAULT_OUTPUT_TOPIC.to_string());

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks = %acks,
            linger_ms = linger.as_millis(),
            compression = %compression,
            "Redpanda publisher created"
        );

        Ok(RedpandaPublisher {
            producer,
            topic,
            timeout,
        })
    }
}
