//! Messaging substrate for the fulfillment services.
//!
//! Two pieces sit on top of a partitioned log broker:
//!
//! - [`Publisher`]: enqueue-only sends plus one background task that drains
//!   delivery reports and logs them.
//! - [`ConsumerPool`]: one poll loop feeding a bounded queue read by N
//!   workers. A full queue drops messages instead of stalling the poll loop.
//!
//! The broker itself is behind [`ProducerClient`] / [`ConsumerClient`]. An
//! in-process [`InMemoryBroker`] is always available; the `kafka` feature
//! adds clients backed by librdkafka.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod publisher;
pub mod shutdown;

pub use broker::{
    BrokerMessage, ConsumerClient, DeliveryReport, DeliveryReports, OutboundRecord,
    ProducerClient,
};
pub use config::{AutoOffsetReset, ConsumerConfig, MessagingConfig, PublisherConfig};
pub use consumer::ConsumerPool;
pub use error::{BoxError, HandlerError, MessagingError, Result};
pub use handler::{EventHandler, FnHandler, MessageHandler, TypedHandler, typed};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConsumerClient, KafkaProducerClient};
pub use memory::{InMemoryBroker, InMemoryConsumer, InMemoryProducer, ProducerOptions};
pub use publisher::{EventPublisher, EventPublisherExt, Publisher};
pub use shutdown::{Shutdown, ShutdownTrigger, shutdown_channel};
