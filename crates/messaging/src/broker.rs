//! Broker client seam.
//!
//! The publisher and the consumer pool only talk to a broker through these
//! two traits, so the in-memory log and the Kafka client are interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// A record handed to a producer client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl OutboundRecord {
    pub fn new(topic: impl Into<String>, key: Option<&str>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: key.map(str::to_string),
            payload,
        }
    }
}

/// A record read back from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Asynchronous outcome of one enqueued record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            error: None,
        }
    }

    pub fn failed(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Channel carrying delivery reports from a producer client.
pub type DeliveryReports = mpsc::UnboundedReceiver<DeliveryReport>;

/// Producer side of a broker.
#[async_trait]
pub trait ProducerClient: Send + Sync + 'static {
    /// Places a record in the client's send buffer. Returns without waiting
    /// for the broker to acknowledge it.
    fn enqueue(&self, record: OutboundRecord) -> Result<()>;

    /// Waits up to `timeout` for outstanding records. Returns how many were
    /// still outstanding when it gave up (0 on success).
    async fn flush(&self, timeout: Duration) -> usize;

    /// Records enqueued but not yet reported.
    fn in_flight(&self) -> usize;

    /// Hands out the delivery report channel. Only the first call gets it.
    fn take_delivery_reports(&self) -> Option<DeliveryReports>;

    /// Releases the client. Enqueue fails afterwards.
    async fn close(&self);
}

/// Consumer side of a broker.
#[async_trait]
pub trait ConsumerClient: Send + Sync + 'static {
    fn subscribe(&self, topics: &[String]) -> Result<()>;

    /// Waits up to `timeout` for the next record. `Ok(None)` on timeout.
    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>>;

    async fn close(&self);
}
