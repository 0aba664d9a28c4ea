//! Payment service: charges, lookups and refunds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{Money, OrderId, PaymentId, UserId};
use metrics::{counter, histogram};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::processor::{PaymentProcessor, ProcessRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPaymentResponse {
    pub payment: Payment,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Default)]
struct PaymentBook {
    payments: HashMap<PaymentId, Payment>,
    /// Latest payment per order.
    by_order: HashMap<OrderId, PaymentId>,
}

/// Charges orders through a [`PaymentProcessor`] and keeps the records
/// in memory.
#[derive(Clone)]
pub struct PaymentService {
    processor: Arc<dyn PaymentProcessor>,
    book: Arc<RwLock<PaymentBook>>,
}

impl PaymentService {
    pub fn new(processor: Arc<dyn PaymentProcessor>) -> Self {
        Self {
            processor,
            book: Arc::default(),
        }
    }

    /// Asks the processor for a decision and records the payment.
    ///
    /// A decline is recorded as FAILED and returned as
    /// [`PaymentError::Declined`] carrying the full response. A processor
    /// fault records nothing.
    #[tracing::instrument(skip(self, req), fields(order_id = %req.order_id, amount = %req.amount))]
    pub async fn process_payment(&self, req: ProcessPaymentRequest) -> Result<ProcessPaymentResponse> {
        let started = Instant::now();
        let method = req.method.as_str();

        let decision = self
            .processor
            .process(&ProcessRequest {
                card_number: req.card_number,
            })
            .await;
        histogram!("payment_processing_duration_seconds", "method" => method)
            .record(started.elapsed().as_secs_f64());

        let result = match decision {
            Ok(result) => result,
            Err(e) => {
                counter!("payments_processed_total", "outcome" => "error").increment(1);
                warn!(error = %e, "Payment processor failed");
                return Err(e.into());
            }
        };

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::generate(),
            order_id: req.order_id,
            user_id: req.user_id,
            amount: req.amount,
            status: if result.success {
                PaymentStatus::Completed
            } else {
                PaymentStatus::Failed
            },
            method: req.method,
            transaction_id: format!("txn-{}", Uuid::new_v4().simple()),
            failure_reason: result.failure_reason,
            created_at: now,
            updated_at: now,
        };
        self.store(payment.clone());

        let response = ProcessPaymentResponse {
            message: payment.outcome_message(),
            success: result.success,
            payment,
        };

        if response.success {
            counter!("payments_processed_total", "outcome" => "completed").increment(1);
            info!(payment_id = %response.payment.id, "Payment completed");
            Ok(response)
        } else {
            counter!("payments_processed_total", "outcome" => "declined").increment(1);
            info!(payment_id = %response.payment.id, message = %response.message, "Payment declined");
            Err(PaymentError::Declined(Box::new(response)))
        }
    }

    pub fn get_payment(&self, id: &PaymentId) -> Result<Payment> {
        self.book
            .read()
            .payments
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(id.clone()))
    }

    /// Latest payment recorded for an order.
    pub fn find_by_order(&self, order_id: &OrderId) -> Option<Payment> {
        let book = self.book.read();
        let id = book.by_order.get(order_id)?;
        book.payments.get(id).cloned()
    }

    /// Marks a completed payment as refunded.
    #[tracing::instrument(skip(self))]
    pub fn refund_payment(&self, id: &PaymentId) -> Result<Payment> {
        let mut book = self.book.write();
        let payment = book
            .payments
            .get_mut(id)
            .ok_or_else(|| PaymentError::NotFound(id.clone()))?;
        if payment.status != PaymentStatus::Completed {
            return Err(PaymentError::InvalidRefund {
                id: id.clone(),
                status: payment.status,
            });
        }
        payment.status = PaymentStatus::Refunded;
        payment.updated_at = Utc::now();

        counter!("payments_refunded_total").increment(1);
        info!(order_id = %payment.order_id, "Payment refunded");
        Ok(payment.clone())
    }

    fn store(&self, payment: Payment) {
        let mut book = self.book.write();
        book.by_order
            .insert(payment.order_id.clone(), payment.id.clone());
        book.payments.insert(payment.id.clone(), payment);
    }
}
