use std::sync::Arc;

use common::{OrderId, ProductId, UserId};
use events::{StockReservationFailed, StockReserved};
use messaging::{EventPublisher, EventPublisherExt, MessagingError};

/// Reason carried by `StockReservationFailed`.
pub const INSUFFICIENT_STOCK: &str = "insufficient stock";

/// Publishes reservation outcomes keyed by order id.
#[derive(Clone)]
pub struct StockEventsPublisher {
    inner: Arc<dyn EventPublisher>,
}

impl StockEventsPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>) -> Self {
        Self { inner }
    }

    pub fn publish_stock_reserved(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<(), MessagingError> {
        self.inner
            .publish_event(&StockReserved::new(order_id, user_id))
    }

    pub fn publish_stock_reservation_failed(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        failed_products: &[ProductId],
    ) -> Result<(), MessagingError> {
        self.inner.publish_event(&StockReservationFailed::new(
            order_id,
            user_id,
            INSUFFICIENT_STOCK,
            failed_products,
        ))
    }
}
