//! Messaging configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::MessagingError;

/// Where a consumer group starts when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoOffsetReset {
    /// Start from the oldest retained record.
    #[default]
    Earliest,
    /// Start from the end of the log.
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Latest => "latest",
        }
    }
}

impl FromStr for AutoOffsetReset {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" | "smallest" | "beginning" => Ok(AutoOffsetReset::Earliest),
            "latest" | "largest" | "end" => Ok(AutoOffsetReset::Latest),
            other => Err(MessagingError::Config(format!(
                "unknown auto offset reset policy '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for AutoOffsetReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consumer worker-pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub auto_offset_reset: AutoOffsetReset,
    /// Number of worker tasks pulling from the queue.
    pub workers: usize,
    /// Bounded queue between the poll loop and the workers.
    pub queue_capacity: usize,
    /// Optional upper bound for one handler invocation.
    pub handle_timeout: Option<Duration>,
    /// How long one broker receive call may block.
    pub poll_timeout: Duration,
}

impl ConsumerConfig {
    /// Returns a copy bound to another consumer group.
    pub fn with_group(&self, group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..self.clone()
        }
    }

    /// Zero values fall back to the defaults.
    pub(crate) fn normalized(&self) -> Self {
        let defaults = Self::default();
        Self {
            workers: if self.workers == 0 {
                defaults.workers
            } else {
                self.workers
            },
            queue_capacity: if self.queue_capacity == 0 {
                defaults.queue_capacity
            } else {
                self.queue_capacity
            },
            poll_timeout: if self.poll_timeout.is_zero() {
                defaults.poll_timeout
            } else {
                self.poll_timeout
            },
            ..self.clone()
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "fulfillment".to_string(),
            auto_offset_reset: AutoOffsetReset::Earliest,
            workers: 4,
            queue_capacity: 128,
            handle_timeout: None,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// Publisher and producer-client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub client_id: String,
    pub acks: String,
    pub delivery_timeout: Duration,
    /// Upper bound for the flush performed by `Publisher::close`.
    pub flush_timeout: Duration,
    pub linger: Duration,
    pub batch_size: usize,
    pub compression: String,
    /// Maximum records the client buffers before refusing new sends.
    pub max_buffered: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            client_id: "fulfillment".to_string(),
            acks: "all".to_string(),
            delivery_timeout: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(5),
            linger: Duration::from_millis(5),
            batch_size: 16_384,
            compression: "snappy".to_string(),
            max_buffered: 100_000,
        }
    }
}

/// Full messaging configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `KAFKA_BROKERS`: comma-separated broker list (default: `"localhost:9092"`)
/// - `KAFKA_CLIENT_ID`, `KAFKA_GROUP_ID`: identities (default: `"fulfillment"`)
/// - `KAFKA_AUTO_OFFSET_RESET`: `earliest` or `latest` (default: `earliest`)
/// - `CONSUMER_WORKERS`, `CONSUMER_QUEUE_CAPACITY`: pool sizing (default: 4 / 128)
/// - `CONSUMER_HANDLE_TIMEOUT_MS`: per-message timeout (default: none)
/// - `CONSUMER_POLL_TIMEOUT_MS`: receive timeout (default: 100)
/// - `PUBLISHER_FLUSH_TIMEOUT_MS`: close flush bound (default: 5000)
/// - `PUBLISHER_LINGER_MS`, `PUBLISHER_BATCH_SIZE`, `PUBLISHER_COMPRESSION`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfig {
    pub brokers: String,
    pub consumer: ConsumerConfig,
    pub publisher: PublisherConfig,
}

impl MessagingConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let consumer = ConsumerConfig {
            group_id: env_or("KAFKA_GROUP_ID", &defaults.consumer.group_id),
            auto_offset_reset: env_parse("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or(defaults.consumer.auto_offset_reset),
            workers: env_parse("CONSUMER_WORKERS").unwrap_or(defaults.consumer.workers),
            queue_capacity: env_parse("CONSUMER_QUEUE_CAPACITY")
                .unwrap_or(defaults.consumer.queue_capacity),
            handle_timeout: env_millis("CONSUMER_HANDLE_TIMEOUT_MS").filter(|d| !d.is_zero()),
            poll_timeout: env_millis("CONSUMER_POLL_TIMEOUT_MS")
                .unwrap_or(defaults.consumer.poll_timeout),
        };
        let publisher = PublisherConfig {
            client_id: env_or("KAFKA_CLIENT_ID", &defaults.publisher.client_id),
            flush_timeout: env_millis("PUBLISHER_FLUSH_TIMEOUT_MS")
                .unwrap_or(defaults.publisher.flush_timeout),
            linger: env_millis("PUBLISHER_LINGER_MS").unwrap_or(defaults.publisher.linger),
            batch_size: env_parse("PUBLISHER_BATCH_SIZE").unwrap_or(defaults.publisher.batch_size),
            compression: env_or("PUBLISHER_COMPRESSION", &defaults.publisher.compression),
            ..defaults.publisher
        };

        Self {
            brokers: env_or("KAFKA_BROKERS", &defaults.brokers),
            consumer: consumer.normalized(),
            publisher,
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            consumer: ConsumerConfig::default(),
            publisher: PublisherConfig::default(),
        }
    }
}

pub(crate) fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub(crate) fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
