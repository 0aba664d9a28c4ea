//! Kafka backend built on `rdkafka`.
//!
//! Enabled with the `kafka` feature. The producer is a `ThreadedProducer`
//! whose background thread polls librdkafka; its delivery callback forwards
//! outcomes onto the same report channel the in-memory producer uses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::ClientConfig;
use rdkafka::client::ClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::broker::{
    BrokerMessage, ConsumerClient, DeliveryReport, DeliveryReports, OutboundRecord,
    ProducerClient,
};
use crate::config::{ConsumerConfig, MessagingConfig, PublisherConfig};
use crate::error::{MessagingError, Result};

/// Forwards librdkafka delivery callbacks as [`DeliveryReport`]s.
pub struct DeliveryContext {
    reports: mpsc::UnboundedSender<DeliveryReport>,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let report = match result {
            Ok(message) => {
                DeliveryReport::delivered(message.topic(), message.partition(), message.offset())
            }
            Err((error, message)) => DeliveryReport::failed(
                message.topic(),
                message.partition(),
                message.offset(),
                error.to_string(),
            ),
        };
        let _ = self.reports.send(report);
    }
}

fn producer_config(brokers: &str, publisher: &PublisherConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("client.id", &publisher.client_id)
        .set("acks", &publisher.acks)
        .set(
            "delivery.timeout.ms",
            publisher.delivery_timeout.as_millis().to_string(),
        )
        .set("linger.ms", publisher.linger.as_millis().to_string())
        .set("batch.size", publisher.batch_size.to_string())
        .set("compression.type", &publisher.compression)
        .set(
            "queue.buffering.max.messages",
            publisher.max_buffered.to_string(),
        );
    config
}

fn consumer_config(brokers: &str, client_id: &str, consumer: &ConsumerConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("client.id", client_id)
        .set("group.id", &consumer.group_id)
        .set("auto.offset.reset", consumer.auto_offset_reset.as_str())
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", "1000");
    config
}

/// Producer client backed by librdkafka.
pub struct KafkaProducerClient {
    producer: Arc<ThreadedProducer<DeliveryContext>>,
    reports: Mutex<Option<DeliveryReports>>,
    closed: AtomicBool,
}

impl KafkaProducerClient {
    pub fn new(config: &MessagingConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<DeliveryContext> =
            producer_config(&config.brokers, &config.publisher)
                .create_with_context(DeliveryContext { reports: tx })
                .map_err(|e| MessagingError::Connection(e.to_string()))?;

        info!(brokers = %config.brokers, "Kafka producer created");
        Ok(Self {
            producer: Arc::new(producer),
            reports: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ProducerClient for KafkaProducerClient {
    fn enqueue(&self, record: OutboundRecord) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed);
        }
        let mut base = BaseRecord::to(&record.topic).payload(&record.payload);
        if let Some(key) = record.key.as_deref() {
            base = base.key(key);
        }
        self.producer.send(base).map_err(|(e, _)| match e {
            rdkafka::error::KafkaError::MessageProduction(
                rdkafka::types::RDKafkaErrorCode::QueueFull,
            ) => MessagingError::QueueFull {
                capacity: self.producer.in_flight_count().max(0) as usize,
            },
            other => MessagingError::Publish(other.to_string()),
        })
    }

    async fn flush(&self, timeout: Duration) -> usize {
        let producer = Arc::clone(&self.producer);
        let flushed = tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await;
        if let Ok(Err(e)) = &flushed {
            warn!(error = %e, "Kafka flush did not complete");
        }
        self.in_flight()
    }

    fn in_flight(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }

    fn take_delivery_reports(&self) -> Option<DeliveryReports> {
        self.reports.lock().take()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Consumer client backed by an rdkafka `StreamConsumer`.
pub struct KafkaConsumerClient {
    consumer: StreamConsumer,
    closed: AtomicBool,
}

impl KafkaConsumerClient {
    pub fn new(config: &MessagingConfig, consumer: &ConsumerConfig) -> Result<Self> {
        let client: StreamConsumer =
            consumer_config(&config.brokers, &config.publisher.client_id, consumer)
                .create()
                .map_err(|e| MessagingError::Connection(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group = %consumer.group_id,
            "Kafka consumer created"
        );
        Ok(Self {
            consumer: client,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| MessagingError::Subscribe(e.to_string()))
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed);
        }
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(MessagingError::Receive(e.to_string())),
            Ok(Ok(message)) => Ok(Some(BrokerMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message
                    .key()
                    .map(|key| String::from_utf8_lossy(key).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.consumer.unsubscribe();
        }
    }
}
