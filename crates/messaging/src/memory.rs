//! In-process partitioned log broker.
//!
//! Topics are split into a fixed number of append-only partitions. Keyed
//! records always land on the same partition; unkeyed records are spread
//! round-robin. Consumer groups keep their own committed offsets, so every
//! group sees every record while members of one group compete for them.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::broker::{
    BrokerMessage, ConsumerClient, DeliveryReport, DeliveryReports, OutboundRecord,
    ProducerClient,
};
use crate::config::{AutoOffsetReset, ConsumerConfig};
use crate::error::{MessagingError, Result};

const DEFAULT_PARTITIONS: usize = 3;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<String>,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    /// Next offset to read, per (group, topic), one slot per partition.
    committed: HashMap<(String, String), Vec<i64>>,
    failing_topics: HashSet<String>,
    round_robin: usize,
}

#[derive(Debug)]
struct BrokerInner {
    partitions: usize,
    state: Mutex<BrokerState>,
    appended: watch::Sender<u64>,
}

impl BrokerInner {
    fn partitions_mut<'a>(
        &self,
        state: &'a mut BrokerState,
        topic: &str,
    ) -> &'a mut Vec<Vec<StoredRecord>> {
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions])
    }

    fn partition_for(&self, state: &mut BrokerState, key: Option<&str>) -> usize {
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % self.partitions as u64) as usize
            }
            None => {
                state.round_robin = state.round_robin.wrapping_add(1);
                state.round_robin % self.partitions
            }
        }
    }

    /// Appends a record and returns where it landed, or the rejection reason.
    fn append(&self, record: OutboundRecord) -> std::result::Result<(i32, i64), String> {
        let landed = {
            let mut state = self.state.lock();
            if state.failing_topics.contains(&record.topic) {
                return Err(format!("broker rejected record for topic {}", record.topic));
            }
            let partition = self.partition_for(&mut state, record.key.as_deref());
            let log = &mut self.partitions_mut(&mut state, &record.topic)[partition];
            log.push(StoredRecord {
                key: record.key,
                payload: record.payload,
            });
            (partition as i32, (log.len() - 1) as i64)
        };
        self.appended.send_modify(|seq| *seq = seq.wrapping_add(1));
        Ok(landed)
    }

    fn join_group(&self, group: &str, topic: &str, reset: AutoOffsetReset) {
        let mut state = self.state.lock();
        let ends: Vec<i64> = self
            .partitions_mut(&mut state, topic)
            .iter()
            .map(|log| log.len() as i64)
            .collect();
        state
            .committed
            .entry((group.to_string(), topic.to_string()))
            .or_insert_with(|| match reset {
                AutoOffsetReset::Earliest => vec![0; ends.len()],
                AutoOffsetReset::Latest => ends,
            });
    }

    /// Reads the next record for a group and commits past it.
    fn next_for_group(&self, group: &str, topics: &[String], start: usize) -> Option<BrokerMessage> {
        let mut state = self.state.lock();
        let slots = topics.len() * self.partitions;
        for step in 0..slots {
            let slot = (start + step) % slots;
            let topic = &topics[slot / self.partitions];
            let partition = slot % self.partitions;

            let Some(log) = state.topics.get(topic).map(|p| &p[partition]) else {
                continue;
            };
            let len = log.len() as i64;
            let group_key = (group.to_string(), topic.clone());
            let Some(next) = state.committed.get(&group_key).map(|o| o[partition]) else {
                continue;
            };
            if next >= len {
                continue;
            }

            let record = state.topics[topic][partition][next as usize].clone();
            if let Some(offsets) = state.committed.get_mut(&group_key) {
                offsets[partition] = next + 1;
            }
            return Some(BrokerMessage {
                topic: topic.clone(),
                partition: partition as i32,
                offset: next,
                key: record.key,
                payload: record.payload,
            });
        }
        None
    }
}

/// Tuning knobs for an in-memory producer.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Records buffered before `enqueue` reports `QueueFull`.
    pub max_buffered: usize,
    /// Artificial latency before each record is acknowledged.
    pub delivery_delay: Duration,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            max_buffered: 100_000,
            delivery_delay: Duration::ZERO,
        }
    }
}

/// Shared handle to an in-process broker. Clones refer to the same logs.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    pub fn with_partitions(partitions: usize) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            inner: Arc::new(BrokerInner {
                partitions: partitions.max(1),
                state: Mutex::new(BrokerState::default()),
                appended,
            }),
        }
    }

    pub fn partitions(&self) -> usize {
        self.inner.partitions
    }

    /// Creates a producer client. Must be called inside a Tokio runtime.
    pub fn producer(&self) -> InMemoryProducer {
        self.producer_with(ProducerOptions::default())
    }

    pub fn producer_with(&self, options: ProducerOptions) -> InMemoryProducer {
        InMemoryProducer::spawn(Arc::clone(&self.inner), options)
    }

    /// Creates a consumer client that joins `config.group_id`.
    pub fn consumer(&self, config: &ConsumerConfig) -> InMemoryConsumer {
        InMemoryConsumer {
            broker: Arc::clone(&self.inner),
            group_id: config.group_id.clone(),
            reset: config.auto_offset_reset,
            topics: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Makes every later delivery to `topic` fail.
    pub fn fail_topic(&self, topic: &str) {
        self.inner.state.lock().failing_topics.insert(topic.to_string());
    }

    pub fn heal_topic(&self, topic: &str) {
        self.inner.state.lock().failing_topics.remove(topic);
    }

    /// Every record in `topic`, partition by partition.
    pub fn messages(&self, topic: &str) -> Vec<BrokerMessage> {
        let state = self.inner.state.lock();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };
        partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(offset, record)| BrokerMessage {
                    topic: topic.to_string(),
                    partition: partition as i32,
                    offset: offset as i64,
                    key: record.key.clone(),
                    payload: record.payload.clone(),
                })
            })
            .collect()
    }

    pub fn message_count(&self, topic: &str) -> usize {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

/// Producer whose deliveries are performed by a background I/O task.
pub struct InMemoryProducer {
    sender: Mutex<Option<mpsc::UnboundedSender<OutboundRecord>>>,
    reports: Mutex<Option<DeliveryReports>>,
    in_flight: Arc<watch::Sender<usize>>,
    io_task: Mutex<Option<JoinHandle<()>>>,
    max_buffered: usize,
}

impl InMemoryProducer {
    fn spawn(broker: Arc<BrokerInner>, options: ProducerOptions) -> Self {
        let (sender, mut records) = mpsc::unbounded_channel::<OutboundRecord>();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0usize);
        let in_flight = Arc::new(in_flight);

        let counter = Arc::clone(&in_flight);
        let delay = options.delivery_delay;
        let io_task = tokio::spawn(async move {
            while let Some(record) = records.recv().await {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let topic = record.topic.clone();
                let report = match broker.append(record) {
                    Ok((partition, offset)) => DeliveryReport::delivered(topic, partition, offset),
                    Err(reason) => DeliveryReport::failed(topic, -1, -1, reason),
                };
                // Nobody listening is fine; the report is informational.
                let _ = report_tx.send(report);
                counter.send_modify(|n| *n = n.saturating_sub(1));
            }
            debug!("in-memory producer I/O task finished");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            reports: Mutex::new(Some(report_rx)),
            in_flight,
            io_task: Mutex::new(Some(io_task)),
            max_buffered: options.max_buffered.max(1),
        }
    }
}

#[async_trait]
impl ProducerClient for InMemoryProducer {
    fn enqueue(&self, record: OutboundRecord) -> Result<()> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(MessagingError::Closed);
        };

        let mut accepted = false;
        self.in_flight.send_if_modified(|n| {
            if *n >= self.max_buffered {
                return false;
            }
            *n += 1;
            accepted = true;
            true
        });
        if !accepted {
            return Err(MessagingError::QueueFull {
                capacity: self.max_buffered,
            });
        }

        sender.send(record).map_err(|_| {
            self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            MessagingError::Closed
        })
    }

    async fn flush(&self, timeout: Duration) -> usize {
        let mut rx = self.in_flight.subscribe();
        let drained = async move { rx.wait_for(|n| *n == 0).await.is_ok() };
        match tokio::time::timeout(timeout, drained).await {
            Ok(true) => 0,
            _ => *self.in_flight.borrow(),
        }
    }

    fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    fn take_delivery_reports(&self) -> Option<DeliveryReports> {
        self.reports.lock().take()
    }

    async fn close(&self) {
        drop(self.sender.lock().take());
        let io_task = self.io_task.lock().take();
        if let Some(io_task) = io_task {
            let _ = io_task.await;
        }
    }
}

/// Consumer that reads as one member of a consumer group.
pub struct InMemoryConsumer {
    broker: Arc<BrokerInner>,
    group_id: String,
    reset: AutoOffsetReset,
    topics: Mutex<Vec<String>>,
    cursor: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryConsumer {
    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

#[async_trait]
impl ConsumerClient for InMemoryConsumer {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed);
        }
        if topics.is_empty() {
            return Err(MessagingError::Subscribe("no topics given".to_string()));
        }
        for topic in topics {
            self.broker.join_group(&self.group_id, topic, self.reset);
        }
        *self.topics.lock() = topics.to_vec();
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed);
        }
        let topics = self.topics.lock().clone();
        if topics.is_empty() {
            return Err(MessagingError::Receive("consumer is not subscribed".to_string()));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut appended = self.broker.appended.subscribe();
        loop {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed);
            if let Some(message) = self.broker.next_for_group(&self.group_id, &topics, start) {
                return Ok(Some(message));
            }
            match tokio::time::timeout_at(deadline, appended.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(None),
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: &str, key: &str, payload: &[u8]) -> OutboundRecord {
        OutboundRecord::new(topic, Some(key), payload.to_vec())
    }

    #[tokio::test]
    async fn test_keyed_records_share_a_partition() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        let mut reports = producer.take_delivery_reports().unwrap();

        for i in 0..5u8 {
            producer.enqueue(record("t", "order-1", &[i])).unwrap();
        }
        assert_eq!(producer.flush(Duration::from_secs(1)).await, 0);

        let mut partitions = HashSet::new();
        let mut offsets = Vec::new();
        for _ in 0..5 {
            let report = reports.recv().await.unwrap();
            assert!(report.is_success());
            partitions.insert(report.partition);
            offsets.push(report.offset);
        }
        assert_eq!(partitions.len(), 1);
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_take_delivery_reports_only_once() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        assert!(producer.take_delivery_reports().is_some());
        assert!(producer.take_delivery_reports().is_none());
    }

    #[tokio::test]
    async fn test_groups_fan_out_and_members_compete() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        for i in 0..4u8 {
            producer
                .enqueue(record("t", &format!("k{i}"), &[i]))
                .unwrap();
        }
        producer.flush(Duration::from_secs(1)).await;

        let topics = vec!["t".to_string()];
        let group_a = ConsumerConfig::default().with_group("a");
        let group_b = ConsumerConfig::default().with_group("b");
        let a1 = broker.consumer(&group_a);
        let a2 = broker.consumer(&group_a);
        let b = broker.consumer(&group_b);
        for consumer in [&a1, &a2, &b] {
            consumer.subscribe(&topics).unwrap();
        }

        let mut seen_by_a = 0;
        for consumer in [&a1, &a2, &a1, &a2] {
            if consumer.poll(Duration::from_millis(10)).await.unwrap().is_some() {
                seen_by_a += 1;
            }
        }
        assert_eq!(seen_by_a, 4);
        assert!(a1.poll(Duration::from_millis(10)).await.unwrap().is_none());

        let mut seen_by_b = 0;
        while b.poll(Duration::from_millis(10)).await.unwrap().is_some() {
            seen_by_b += 1;
        }
        assert_eq!(seen_by_b, 4);
    }

    #[tokio::test]
    async fn test_latest_skips_existing_records() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        producer.enqueue(record("t", "k", b"old")).unwrap();
        producer.flush(Duration::from_secs(1)).await;

        let config = ConsumerConfig {
            auto_offset_reset: AutoOffsetReset::Latest,
            ..ConsumerConfig::default()
        };
        let consumer = broker.consumer(&config);
        consumer.subscribe(&["t".to_string()]).unwrap();
        assert!(consumer.poll(Duration::from_millis(10)).await.unwrap().is_none());

        producer.enqueue(record("t", "k", b"new")).unwrap();
        let message = consumer.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(message.payload, b"new");
    }

    #[tokio::test]
    async fn test_poll_wakes_on_append() {
        let broker = InMemoryBroker::new();
        let consumer = broker.consumer(&ConsumerConfig::default());
        consumer.subscribe(&["t".to_string()]).unwrap();

        let producer = broker.producer();
        let poll = tokio::spawn(async move { consumer.poll(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.enqueue(record("t", "k", b"hello")).unwrap();

        let message = poll.await.unwrap().unwrap().unwrap();
        assert_eq!(message.payload, b"hello");
        assert_eq!(message.key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_failing_topic_reports_errors() {
        let broker = InMemoryBroker::new();
        broker.fail_topic("t");
        let producer = broker.producer();
        let mut reports = producer.take_delivery_reports().unwrap();

        producer.enqueue(record("t", "k", b"x")).unwrap();
        let report = reports.recv().await.unwrap();
        assert!(!report.is_success());
        assert_eq!(broker.message_count("t"), 0);
    }

    #[tokio::test]
    async fn test_enqueue_after_close_fails() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer();
        producer.close().await;
        assert!(matches!(
            producer.enqueue(record("t", "k", b"x")),
            Err(MessagingError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_rejects_and_flush_times_out() {
        let broker = InMemoryBroker::new();
        let producer = broker.producer_with(ProducerOptions {
            max_buffered: 2,
            delivery_delay: Duration::from_secs(10),
        });

        producer.enqueue(record("t", "k", b"1")).unwrap();
        producer.enqueue(record("t", "k", b"2")).unwrap();
        assert!(matches!(
            producer.enqueue(record("t", "k", b"3")),
            Err(MessagingError::QueueFull { capacity: 2 })
        ));

        assert_eq!(producer.flush(Duration::from_secs(1)).await, 2);
        assert_eq!(producer.flush(Duration::from_secs(30)).await, 0);
        assert_eq!(broker.message_count("t"), 2);
    }
}
