//! Where the platform gets its broker clients from.

use messaging::{ConsumerClient, ConsumerConfig, InMemoryBroker, ProducerClient};

/// Creates producer and consumer clients for one broker.
pub trait BrokerConnector: Send + Sync {
    type Producer: ProducerClient;
    type Consumer: ConsumerClient;

    fn producer(&self) -> messaging::Result<Self::Producer>;

    fn consumer(&self, config: &ConsumerConfig) -> messaging::Result<Self::Consumer>;
}

impl BrokerConnector for InMemoryBroker {
    type Producer = messaging::InMemoryProducer;
    type Consumer = messaging::InMemoryConsumer;

    fn producer(&self) -> messaging::Result<Self::Producer> {
        Ok(InMemoryBroker::producer(self))
    }

    fn consumer(&self, config: &ConsumerConfig) -> messaging::Result<Self::Consumer> {
        Ok(InMemoryBroker::consumer(self, config))
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaConnector;

#[cfg(feature = "kafka")]
mod kafka {
    use messaging::{ConsumerConfig, KafkaConsumerClient, KafkaProducerClient, MessagingConfig};

    use super::BrokerConnector;

    /// Connects every client to the brokers named in a [`MessagingConfig`].
    #[derive(Debug, Clone)]
    pub struct KafkaConnector {
        config: MessagingConfig,
    }

    impl KafkaConnector {
        pub fn new(config: MessagingConfig) -> Self {
            Self { config }
        }
    }

    impl BrokerConnector for KafkaConnector {
        type Producer = KafkaProducerClient;
        type Consumer = KafkaConsumerClient;

        fn producer(&self) -> messaging::Result<Self::Producer> {
            KafkaProducerClient::new(&self.config)
        }

        fn consumer(&self, config: &ConsumerConfig) -> messaging::Result<Self::Consumer> {
            KafkaConsumerClient::new(&self.config, config)
        }
    }
}
