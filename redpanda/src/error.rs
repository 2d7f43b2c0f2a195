//! Producer and consumer errors.

use beverage_inventor_core::{ErrorKind, InventorError};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use thiserror::Error;

/// Errors from [`RedpandaPublisher`](crate::RedpandaPublisher).
#[derive(Debug, Error)]
pub enum ProducerError {
    /// No broker addresses were given
    #[error("brokers not configured")]
    MissingBrokers,

    /// The client could not be created
    #[error("failed to create producer: {0}")]
    Create(#[source] KafkaError),

    /// The broker did not acknowledge the message
    #[error("delivery to {topic} failed: {source}")]
    Delivery {
        /// Destination topic
        topic: String,
        /// Underlying client error
        #[source]
        source: KafkaError,
    },

    /// Outstanding messages were not delivered before the flush timeout
    #[error("flush failed: {0}")]
    Flush(#[source] KafkaError),

    /// Cluster metadata could not be fetched
    #[error("brokers unreachable: {0}")]
    Unreachable(#[source] KafkaError),
}

/// Errors from [`RedpandaConsumer`](crate::RedpandaConsumer).
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Brokers, group id or topics missing
    #[error("consumer misconfigured: {0}")]
    Config(String),

    /// The client could not be created
    #[error("failed to create consumer: {0}")]
    Create(#[source] KafkaError),

    /// Subscribing to the topic set failed
    #[error("failed to subscribe to {topics:?}: {source}")]
    Subscribe {
        /// Requested topics
        topics: Vec<String>,
        /// Underlying client error
        #[source]
        source: KafkaError,
    },

    /// An offset commit was rejected
    #[error("commit of {topic}/{partition}@{offset} failed: {source}")]
    Commit {
        /// Topic
        topic: String,
        /// Partition
        partition: i32,
        /// Offset that was being committed
        offset: i64,
        /// Underlying client error
        #[source]
        source: KafkaError,
    },

    /// A partition worker stopped while messages were still being routed to it
    #[error("dispatch queue for {topic}/{partition} is closed")]
    QueueClosed {
        /// Topic
        topic: String,
        /// Partition
        partition: i32,
    },
}

/// Whether a client error is worth retrying.
///
/// Broker unavailability and timeouts are transient; everything else is a
/// definitive rejection.
#[must_use]
pub fn is_transient(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::QueueFull
                | RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::NetworkException
                | RDKafkaErrorCode::LeaderNotAvailable
                | RDKafkaErrorCode::NotLeaderForPartition
        )
    )
}

impl From<ProducerError> for InventorError {
    fn from(err: ProducerError) -> Self {
        let kind = match &err {
            ProducerError::Delivery { source, .. }
            | ProducerError::Flush(source)
            | ProducerError::Unreachable(source)
                if is_transient(source) =>
            {
                ErrorKind::TransientIo
            }
            ProducerError::MissingBrokers | ProducerError::Create(_) | ProducerError::Unreachable(_) => {
                ErrorKind::Internal
            }
            ProducerError::Delivery { .. } | ProducerError::Flush(_) => ErrorKind::PublishFailed,
        };
        Self::new(kind, "event_bus.publish", err.to_string())
    }
}

impl From<ConsumerError> for InventorError {
    fn from(err: ConsumerError) -> Self {
        let kind = match &err {
            ConsumerError::Commit { source, .. } if is_transient(source) => ErrorKind::TransientIo,
            ConsumerError::Subscribe { source, .. } if is_transient(source) => ErrorKind::TransientIo,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, "event_bus.consume", err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_delivery_timeout_is_transient() {
        let err = ProducerError::Delivery {
            topic: "beverage.events".into(),
            source: KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
        };
        let classified = InventorError::from(err);
        assert_eq!(classified.kind, ErrorKind::TransientIo);
        assert_eq!(classified.operation, "event_bus.publish");
    }

    #[test]
    fn test_rejected_message_is_publish_failed() {
        let err = ProducerError::Delivery {
            topic: "beverage.events".into(),
            source: KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge),
        };
        assert_eq!(InventorError::from(err).kind, ErrorKind::PublishFailed);
    }

    #[test]
    fn test_missing_brokers_is_internal() {
        assert_eq!(InventorError::from(ProducerError::MissingBrokers).kind, ErrorKind::Internal);
    }

    #[test]
    fn test_queue_closed_message() {
        let err = ConsumerError::QueueClosed {
            topic: "recipe.requests".into(),
            partition: 2,
        };
        assert_eq!(err.to_string(), "dispatch queue for recipe.requests/2 is closed");
    }
}
