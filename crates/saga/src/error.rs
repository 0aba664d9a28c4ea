//! Platform error types.

use messaging::MessagingError;
use thiserror::Error;

/// Errors raised while starting or stopping the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A broker client could not be created or closed cleanly.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// A consumer pool ended with an error.
    #[error("Consumer pool {group}/{topic} failed: {source}")]
    Pool {
        group: String,
        topic: String,
        #[source]
        source: MessagingError,
    },

    /// A consumer pool task panicked or was cancelled.
    #[error("Consumer pool {group}/{topic} aborted: {reason}")]
    PoolAborted {
        group: String,
        topic: String,
        reason: String,
    },
}

/// Convenience type alias for platform results.
pub type Result<T> = std::result::Result<T, PlatformError>;
