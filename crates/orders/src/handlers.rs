use async_trait::async_trait;
use common::OrderId;
use events::PaymentProcessed;
use messaging::{BoxError, EventHandler};
use tracing::warn;

use crate::service::OrderService;
use crate::status::OrderStatus;

/// Moves an order to CONFIRMED or CANCELLED once its payment settles.
///
/// A rejected transition is logged and acknowledged: redelivering the same
/// event would be rejected again.
#[derive(Clone)]
pub struct PaymentProcessedHandler {
    service: OrderService,
}

impl PaymentProcessedHandler {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }

    pub fn target_status(event: &PaymentProcessed) -> OrderStatus {
        if event.success {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Cancelled
        }
    }
}

#[async_trait]
impl EventHandler<PaymentProcessed> for PaymentProcessedHandler {
    async fn handle(&self, event: PaymentProcessed) -> Result<(), BoxError> {
        let status = Self::target_status(&event);
        let order_id = OrderId::new(event.order_id);
        if let Err(e) = self.service.update_order_status(&order_id, status).await {
            warn!(order_id = %order_id, %status, error = %e, "Update order status failed");
        }
        Ok(())
    }
}
