use std::sync::Arc;

use events::{OrderCreated, OrderLine};
use messaging::{EventPublisher, EventPublisherExt, MessagingError};

use crate::order::Order;

/// Publishes order lifecycle events keyed by order id.
#[derive(Clone)]
pub struct OrderEventsPublisher {
    inner: Arc<dyn EventPublisher>,
}

impl OrderEventsPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>) -> Self {
        Self { inner }
    }

    pub fn publish_order_created(&self, order: &Order) -> Result<(), MessagingError> {
        let lines = order
            .items()
            .iter()
            .map(|item| OrderLine::new(&item.product_id, item.quantity))
            .collect();
        self.inner.publish_event(&OrderCreated::new(
            order.id(),
            order.user_id(),
            lines,
            order.total(),
        ))
    }
}
