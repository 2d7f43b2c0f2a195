//! Redpanda event egress and ingress for the beverage inventor.
//!
//! - [`RedpandaPublisher`] implements
//!   [`EventPublisher`](beverage_inventor_core::ports::EventPublisher): one
//!   JSON message per [`BeverageEvent`](beverage_inventor_core::BeverageEvent),
//!   keyed by the beverage id, with `content-type`, `timestamp` and
//!   `producer` headers.
//! - [`RedpandaConsumer`] subscribes to `recipe.requests` and
//!   `ingredient.discovered`, routes each partition to its own sequential
//!   worker and commits offsets after the [`Dispatcher`] is done with them.
//!
//! Works with any Kafka-compatible broker.
//!
//! ```text
//!  recipe.requests ─┐                      ┌─ partition 0 worker ─┐
//!                   ├─ RedpandaConsumer ───┤                      ├─ Pipeline ─ RedpandaPublisher ─ beverage.events
//!  ingredient.disc ─┘                      └─ partition N worker ─┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod producer;
pub mod security;

pub use consumer::{
    Assignment, OffsetCommitter, PartitionRouter, RedpandaConsumer, RedpandaConsumerBuilder,
};
pub use dispatch::{Dispatcher, Disposition, InboundMessage, RequestHandler, Topics};
pub use error::{ConsumerError, ProducerError};
pub use producer::{RedpandaPublisher, RedpandaPublisherBuilder};
pub use security::KafkaSecurity;
