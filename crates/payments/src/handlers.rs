//! Consumers of the saga events the payment service reacts to.

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use events::{OrderCreated, StockReserved};
use messaging::{BoxError, EventHandler};
use tracing::{debug, error, info, warn};

use crate::cache::OrderTotalsCache;
use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::payment::{Payment, PaymentMethod};
use crate::publisher::PaymentEventsPublisher;
use crate::service::{PaymentService, ProcessPaymentRequest};

/// Remembers each new order's total for the charge that follows.
#[derive(Clone)]
pub struct OrderCreatedHandler {
    cache: OrderTotalsCache,
    config: PaymentConfig,
}

impl OrderCreatedHandler {
    pub fn new(cache: OrderTotalsCache, config: PaymentConfig) -> Self {
        Self { cache, config }
    }
}

#[async_trait]
impl EventHandler<OrderCreated> for OrderCreatedHandler {
    async fn handle(&self, event: OrderCreated) -> Result<(), BoxError> {
        let order_id = OrderId::new(event.order_id);
        match Money::new(event.total_amount, event.currency) {
            Ok(total) => {
                debug!(order_id = %order_id, %total, "Order total cached");
                self.cache.set(&order_id, total, self.config.order_total_ttl);
            }
            Err(e) => warn!(order_id = %order_id, error = %e, "Order total not cached"),
        }
        Ok(())
    }
}

/// Charges an order once its stock is reserved and announces the outcome.
///
/// Technical failures (processor down, timeout) are logged and the event is
/// acknowledged without publishing anything. An order that already has a
/// payment is not charged again; its outcome is re-published.
#[derive(Clone)]
pub struct StockReservedHandler {
    service: PaymentService,
    cache: OrderTotalsCache,
    publisher: Option<PaymentEventsPublisher>,
    config: PaymentConfig,
}

impl StockReservedHandler {
    pub fn new(service: PaymentService, cache: OrderTotalsCache, config: PaymentConfig) -> Self {
        Self {
            service,
            cache,
            publisher: None,
            config,
        }
    }

    pub fn with_publisher(mut self, publisher: PaymentEventsPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    fn publish(&self, payment: &Payment) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        match publisher.publish_payment_processed(payment) {
            Ok(()) => info!(
                order_id = %payment.order_id,
                payment_id = %payment.id,
                success = payment.is_successful(),
                "PaymentProcessed published"
            ),
            Err(e) => error!(
                order_id = %payment.order_id,
                payment_id = %payment.id,
                error = %e,
                "Failed to publish PaymentProcessed"
            ),
        }
    }
}

#[async_trait]
impl EventHandler<StockReserved> for StockReservedHandler {
    async fn handle(&self, event: StockReserved) -> Result<(), BoxError> {
        let order_id = OrderId::new(event.order_id);
        let user_id = UserId::new(event.user_id);

        if let Some(existing) = self.service.find_by_order(&order_id) {
            info!(order_id = %order_id, payment_id = %existing.id, "Order already charged");
            self.publish(&existing);
            return Ok(());
        }

        // OrderCreated is consumed by a separate pool and may still be in flight.
        let amount = match self
            .cache
            .wait_for(&order_id, self.config.order_total_wait)
            .await
        {
            Some(total) => total,
            None => {
                warn!(order_id = %order_id, "No cached order total, charging zero");
                Money::usd(0)
            }
        };
        let request = ProcessPaymentRequest {
            order_id: order_id.clone(),
            user_id: user_id.clone(),
            amount,
            method: PaymentMethod::CreditCard,
            card_number: self.config.card_number.clone(),
        };

        let timeout = self.config.process_timeout;
        let outcome = match tokio::time::timeout(timeout, self.service.process_payment(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PaymentError::Timeout(timeout)),
        };

        let payment = match outcome {
            Ok(response) => response.payment,
            Err(PaymentError::Declined(response)) => response.payment,
            Err(e) => {
                warn!(
                    order_id = %order_id,
                    user_id = %user_id,
                    error = %e,
                    "Process payment failed (technical)"
                );
                return Ok(());
            }
        };

        self.publish(&payment);
        self.cache.remove(&order_id);
        Ok(())
    }
}
