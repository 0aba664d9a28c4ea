//! Payment record.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
        }
    }
}

/// One charge attempt against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub transaction_id: String,
    /// Processor's reason for a decline.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Human-readable outcome carried by `PaymentProcessed`.
    pub fn outcome_message(&self) -> String {
        match (self.status, &self.failure_reason) {
            (PaymentStatus::Completed, _) => "Payment processed successfully".to_string(),
            (PaymentStatus::Refunded, _) => "Payment refunded".to_string(),
            (PaymentStatus::Failed, Some(reason)) if !reason.is_empty() => {
                format!("Payment failed - {reason}")
            }
            (PaymentStatus::Failed, _) => "Payment failed".to_string(),
        }
    }
}
