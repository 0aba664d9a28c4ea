use std::sync::Arc;

use events::PaymentProcessed;
use messaging::{EventPublisher, EventPublisherExt, MessagingError};

use crate::payment::Payment;

/// Publishes payment outcomes keyed by order id.
#[derive(Clone)]
pub struct PaymentEventsPublisher {
    inner: Arc<dyn EventPublisher>,
}

impl PaymentEventsPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>) -> Self {
        Self { inner }
    }

    pub fn publish_payment_processed(&self, payment: &Payment) -> Result<(), MessagingError> {
        self.inner.publish_event(&PaymentProcessed::new(
            &payment.order_id,
            &payment.id,
            payment.is_successful(),
            payment.outcome_message(),
            &payment.amount,
        ))
    }
}
