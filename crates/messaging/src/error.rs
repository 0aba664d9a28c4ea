use std::time::Duration;

use events::CodecError;
use thiserror::Error;

/// Errors raised by broker clients, publishers and consumer pools.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Could not create or reach the broker client.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The client refused to enqueue a record.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The client's outstanding-send buffer is full.
    #[error("Send buffer full: {capacity} records outstanding")]
    QueueFull { capacity: usize },

    /// Subscribing to topics failed.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// A broker receive call failed with something other than a timeout.
    #[error("Receive failed: {0}")]
    Receive(String),

    /// The client or publisher has already been closed.
    #[error("Client is closed")]
    Closed,

    /// Delivery reports of a producer can only be drained by one publisher.
    #[error("Delivery reports have already been taken")]
    ReportsTaken,

    /// Close gave up waiting for outstanding sends.
    #[error("{remaining} messages were not flushed before the timeout")]
    FlushTimeout { remaining: usize },

    /// A configuration value could not be used.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience type alias for messaging results.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Boxed error returned by domain event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a worker considered a message failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(BoxError),

    /// The handler did not finish within the per-message timeout.
    #[error("handler timed out after {0:?}")]
    Timeout(Duration),

    /// The handler panicked; the worker survived.
    #[error("handler panicked")]
    Panicked,

    /// The payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
