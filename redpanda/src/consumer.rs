//! Event ingress.
//!
//! One consumer fetches from every subscribed topic. Each fetched record is
//! routed to a worker owned by its `(topic, partition)`; the worker runs
//! messages strictly in offset order and commits each offset only after
//! [`Dispatcher::dispatch`] says so. The per-partition queues are bounded,
//! so a slow pipeline stalls fetching instead of growing the offset lag.
//!
//! # Delivery semantics
//!
//! At-least-once. A message whose handler failed with a retryable or
//! unclassified error is dispatched again after `redelivery_delay`, and
//! nothing behind it in the same partition runs or commits until it
//! succeeds. On shutdown such a message stays uncommitted and is delivered
//! again after restart.
//!
//! # Rebalancing
//!
//! The rebalance callback marks revoked partitions in the shared
//! [`Assignment`] before the group hands them to another member. A revoked
//! worker stops before its next dispatch or commit, leaving the offset to
//! the new owner; the router starts a fresh worker if the partition comes
//! back.

use crate::dispatch::{Dispatcher, Disposition, InboundMessage};
use crate::error::ConsumerError;
use crate::security::KafkaSecurity;
use beverage_inventor_resilience::metrics::EventBusMetrics;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Commits processed offsets.
///
/// `offset` is the offset of the processed message; implementations commit
/// the position after it.
pub trait OffsetCommitter: Send + Sync + 'static {
    /// Mark `offset` on `topic`/`partition` as processed.
    ///
    /// # Errors
    ///
    /// [`ConsumerError::Commit`] if the commit is rejected.
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError>;
}

type PartitionKey = (String, i32);

/// Partitions this group member owns, shared between the router and the
/// rebalance callback.
///
/// Each worker holds an ownership flag; revoking a partition lowers it.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    owned: Arc<Mutex<HashMap<PartitionKey, Arc<AtomicBool>>>>,
}

impl Assignment {
    fn lock(&self) -> MutexGuard<'_, HashMap<PartitionKey, Arc<AtomicBool>>> {
        self.owned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, topic: &str, partition: i32) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(true));
        if let Some(previous) = self.lock().insert((topic.to_string(), partition), Arc::clone(&flag)) {
            previous.store(false, Ordering::SeqCst);
        }
        flag
    }

    /// Lower the ownership flag of each `(topic, partition)`.
    pub fn revoke<'a>(&self, partitions: impl IntoIterator<Item = (&'a str, i32)>) {
        let mut owned = self.lock();
        for (topic, partition) in partitions {
            if let Some(flag) = owned.remove(&(topic.to_string(), partition)) {
                flag.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Whether `topic`/`partition` has a live worker.
    #[must_use]
    pub fn owns(&self, topic: &str, partition: i32) -> bool {
        self.lock().contains_key(&(topic.to_string(), partition))
    }
}

/// Forwards group rebalances to the [`Assignment`].
struct RebalanceContext {
    assignment: Assignment,
}

impl ClientContext for RebalanceContext {}

impl ConsumerContext for RebalanceContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Revoke(list) => {
                let elements = list.elements();
                tracing::info!(partitions = elements.len(), "Partitions revoked");
                self.assignment
                    .revoke(elements.iter().map(|e| (e.topic(), e.partition())));
            }
            Rebalance::Assign(list) => {
                tracing::info!(partitions = list.count(), "Partitions assigned");
            }
            Rebalance::Error(err) => tracing::warn!(error = %err, "Rebalance failed"),
        }
    }
}

/// Commits through a live consumer.
struct KafkaCommitter(Arc<StreamConsumer<RebalanceContext>>);

impl OffsetCommitter for KafkaCommitter {
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
        let commit_error = |source| ConsumerError::Commit {
            topic: topic.to_string(),
            partition,
            offset,
            source,
        };
        let mut list = TopicPartitionList::new();
        list.add_partition_offset(topic, partition, Offset::Offset(offset + 1))
            .map_err(commit_error)?;
        self.0.commit(&list, CommitMode::Async).map_err(commit_error)
    }
}

/// Fans fetched messages out to one sequential worker per partition.
pub struct PartitionRouter {
    dispatcher: Arc<Dispatcher>,
    committer: Arc<dyn OffsetCommitter>,
    queue_capacity: usize,
    redelivery_delay: Duration,
    shutdown: watch::Receiver<bool>,
    assignment: Assignment,
    queues: HashMap<PartitionKey, PartitionQueue>,
    workers: JoinSet<()>,
}

struct PartitionQueue {
    tx: mpsc::Sender<InboundMessage>,
    owned: Arc<AtomicBool>,
}

impl PartitionRouter {
    /// Route into workers with queues of `queue_capacity` messages.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        committer: Arc<dyn OffsetCommitter>,
        queue_capacity: usize,
        redelivery_delay: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dispatcher,
            committer,
            queue_capacity: queue_capacity.max(1),
            redelivery_delay,
            shutdown,
            assignment: Assignment::default(),
            queues: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    /// Track ownership in `assignment` instead of a private one.
    #[must_use]
    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// The ownership table the workers check.
    #[must_use]
    pub fn assignment(&self) -> Assignment {
        self.assignment.clone()
    }

    /// Queue `message` on its partition's worker, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// [`ConsumerError::QueueClosed`] if the partition's worker has stopped,
    /// which happens only after a shutdown signal.
    pub async fn route(&mut self, message: InboundMessage) -> Result<(), ConsumerError> {
        self.queues.retain(|_, queue| queue.owned.load(Ordering::SeqCst));

        let key = (message.topic.clone(), message.partition);
        if !self.queues.contains_key(&key) {
            let (tx, rx) = mpsc::channel(self.queue_capacity);
            let owned = self.assignment.claim(&key.0, key.1);
            self.workers.spawn(run_partition(
                rx,
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.committer),
                self.redelivery_delay,
                self.shutdown.clone(),
                Arc::clone(&owned),
            ));
            tracing::debug!(topic = %key.0, partition = key.1, "Partition worker started");
            self.queues.insert(key.clone(), PartitionQueue { tx, owned });
        }

        let queue = self.queues.get(&key).ok_or_else(|| ConsumerError::QueueClosed {
            topic: key.0.clone(),
            partition: key.1,
        })?;
        queue.tx.send(message).await.map_err(|_| ConsumerError::QueueClosed {
            topic: key.0,
            partition: key.1,
        })
    }

    /// Number of owned partitions with a worker.
    #[must_use]
    pub fn partitions(&self) -> usize {
        self.queues
            .values()
            .filter(|queue| queue.owned.load(Ordering::SeqCst))
            .count()
    }

    /// Close every queue and wait for the workers.
    ///
    /// Workers finish the message in hand. After a shutdown signal they
    /// leave the rest of their queue uncommitted; without one they drain it.
    pub async fn finish(mut self) {
        self.queues.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "Partition worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for PartitionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionRouter")
            .field("partitions", &self.queues.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

async fn run_partition(
    mut queue: mpsc::Receiver<InboundMessage>,
    dispatcher: Arc<Dispatcher>,
    committer: Arc<dyn OffsetCommitter>,
    redelivery_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
    owned: Arc<AtomicBool>,
) {
    let revoked = |message: &InboundMessage| {
        let gone = !owned.load(Ordering::SeqCst);
        if gone {
            tracing::info!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Partition revoked; offset left to the new owner"
            );
        }
        gone
    };

    while let Some(message) = queue.recv().await {
        if revoked(&message) {
            return;
        }
        if *shutdown.borrow() {
            tracing::info!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Shutting down; queued messages left for redelivery"
            );
            return;
        }

        while dispatcher.dispatch(&message).await == Disposition::Redeliver {
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                delay_ms = u64::try_from(redelivery_delay.as_millis()).unwrap_or(u64::MAX),
                "Message will be redelivered"
            );
            tokio::select! {
                () = tokio::time::sleep(redelivery_delay) => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                tracing::info!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Shutting down; offset left uncommitted"
                );
                return;
            }
            if revoked(&message) {
                return;
            }
        }

        if revoked(&message) {
            return;
        }
        match committer.commit(&message.topic, message.partition, message.offset) {
            Ok(()) => {
                EventBusMetrics::record_commit(&message.topic);
                tracing::debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Offset committed"
                );
            }
            Err(err) => tracing::warn!(error = %err, "Failed to commit offset (message may be redelivered)"),
        }
    }
}

/// Consumes the inbound topics and feeds the [`Dispatcher`].
pub struct RedpandaConsumer {
    brokers: String,
    group_id: String,
    auto_offset_reset: String,
    session_timeout: Duration,
    queue_capacity: usize,
    redelivery_delay: Duration,
    security: KafkaSecurity,
    running: Arc<AtomicBool>,
}

impl RedpandaConsumer {
    /// Start a builder.
    #[must_use]
    pub fn builder() -> RedpandaConsumerBuilder {
        RedpandaConsumerBuilder::default()
    }

    /// Flag that is `true` while [`run`](Self::run) is fetching.
    #[must_use]
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Fetch and dispatch until `shutdown` turns `true`.
    ///
    /// On shutdown fetching stops first, then in-flight messages finish and
    /// their commits are issued before this returns.
    ///
    /// # Errors
    ///
    /// [`ConsumerError::Create`] or [`ConsumerError::Subscribe`] at startup.
    pub async fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        let topics: Vec<String> = dispatcher.topics().all().iter().map(ToString::to_string).collect();

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false");
        self.security.apply(&mut config);

        let assignment = Assignment::default();
        let context = RebalanceContext {
            assignment: assignment.clone(),
        };
        let consumer: Arc<StreamConsumer<RebalanceContext>> =
            Arc::new(config.create_with_context(context).map_err(ConsumerError::Create)?);
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|source| ConsumerError::Subscribe {
                topics: topics.clone(),
                source,
            })?;

        tracing::info!(
            topics = ?topics,
            group_id = %self.group_id,
            queue_capacity = self.queue_capacity,
            auto_offset_reset = %self.auto_offset_reset,
            "Consumer subscribed"
        );

        let mut router = PartitionRouter::new(
            dispatcher,
            Arc::new(KafkaCommitter(Arc::clone(&consumer))),
            self.queue_capacity,
            self.redelivery_delay,
            shutdown.clone(),
        )
        .with_assignment(assignment);

        self.running.store(true, Ordering::SeqCst);
        {
            let mut stream = consumer.stream();
            while !*shutdown.borrow() {
                tokio::select! {
                    next = stream.next() => match next {
                        Some(Ok(message)) => {
                            if let Err(err) = router.route(inbound(&message)).await {
                                tracing::warn!(error = %err, "Routing stopped");
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            EventBusMetrics::record_consume_error();
                            tracing::error!(error = %err, "Failed to receive message");
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("Shutdown signal received; consumer stops fetching");
                        }
                    }
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);

        router.finish().await;
        tracing::info!("Consumer stopped");
        Ok(())
    }
}

impl std::fmt::Debug for RedpandaConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaConsumer")
            .field("brokers", &self.brokers)
            .field("group_id", &self.group_id)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

fn inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| (h.key.to_string(), h.value.map(<[u8]>::to_vec).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec),
        headers,
    }
}

/// Builder for [`RedpandaConsumer`].
#[derive(Debug, Default)]
pub struct RedpandaConsumerBuilder {
    brokers: Option<String>,
    group_id: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
    queue_capacity: Option<usize>,
    redelivery_delay: Option<Duration>,
    security: KafkaSecurity,
}

impl RedpandaConsumerBuilder {
    /// Comma-separated broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Consumer group id.
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Where a new group starts reading: `earliest` or `latest`. Default: `latest`.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Group session timeout. Default: 6 seconds.
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Messages buffered per partition. Default: 100.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Pause before a failed message is dispatched again. Default: 5 seconds.
    #[must_use]
    pub const fn redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = Some(delay);
        self
    }

    /// TLS / SASL settings.
    #[must_use]
    pub fn security(mut self, security: KafkaSecurity) -> Self {
        self.security = security;
        self
    }

    /// Validate the settings. The client is created by [`RedpandaConsumer::run`].
    ///
    /// # Errors
    ///
    /// [`ConsumerError::Config`] without brokers or group id, or with a zero
    /// queue capacity.
    pub fn build(self) -> Result<RedpandaConsumer, ConsumerError> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| ConsumerError::Config("brokers not configured".to_string()))?;
        let group_id = self
            .group_id
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| ConsumerError::Config("consumer group id not configured".to_string()))?;
        let queue_capacity = self.queue_capacity.unwrap_or(100);
        if queue_capacity == 0 {
            return Err(ConsumerError::Config("queue capacity must be positive".to_string()));
        }

        Ok(RedpandaConsumer {
            brokers,
            group_id,
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "latest".to_string()),
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(6)),
            queue_capacity,
            redelivery_delay: self.redelivery_delay.unwrap_or(Duration::from_secs(5)),
            security: self.security,
            running: Arc::new(AtomicBool::new(false)),
        })
    }
}
