use std::time::Duration;

use common::PaymentId;
use thiserror::Error;

use crate::payment::PaymentStatus;
use crate::processor::ProcessorError;
use crate::service::ProcessPaymentResponse;

/// Errors raised by the payment service.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The processor declined the charge. The recorded payment is attached
    /// so callers can still report the outcome.
    #[error("payment declined: {}", .0.message)]
    Declined(Box<ProcessPaymentResponse>),

    /// No decision was made; nothing was recorded.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("payment processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("payment not found: {0}")]
    NotFound(PaymentId),

    #[error("invalid refund: payment {id} is {status}")]
    InvalidRefund { id: PaymentId, status: PaymentStatus },
}

impl PaymentError {
    /// A technical failure rather than a business outcome.
    pub fn is_technical(&self) -> bool {
        matches!(self, PaymentError::Processor(_) | PaymentError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
