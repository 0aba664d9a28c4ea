//! Consumers of the saga events the inventory service reacts to.

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use events::{OrderCreated, PaymentProcessed};
use messaging::{BoxError, EventHandler};
use tracing::{info, warn};

use crate::error::InventoryError;
use crate::models::StockItem;
use crate::service::{InventoryService, StockShortage};

/// Reserves stock for every new order.
#[derive(Clone)]
pub struct OrderCreatedHandler {
    service: InventoryService,
}

impl OrderCreatedHandler {
    pub fn new(service: InventoryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderCreated> for OrderCreatedHandler {
    async fn handle(&self, event: OrderCreated) -> Result<(), BoxError> {
        let order_id = OrderId::new(event.order_id);
        let user_id = UserId::new(event.user_id);

        let mut items = Vec::with_capacity(event.items.len());
        let mut rejected = Vec::new();
        for line in event.items {
            let product_id = ProductId::new(line.product_id);
            match u32::try_from(line.quantity) {
                Ok(quantity) => items.push(StockItem { product_id, quantity }),
                Err(_) => {
                    let reason = InventoryError::InvalidQuantity {
                        product_id: product_id.clone(),
                        quantity: i64::from(line.quantity),
                    }
                    .to_string();
                    rejected.push(StockShortage {
                        product_id,
                        requested_quantity: 0,
                        reason,
                    });
                }
            }
        }

        match self
            .service
            .reserve_with_rejections(&order_id, &user_id, &items, rejected)
            .await
        {
            Ok(_) => Ok(()),
            // Redelivered event for an order that already holds stock.
            Err(InventoryError::DuplicateReservation(_)) => {
                info!(order_id = %order_id, "Reservation already exists, skipping");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Commits or releases the order's reservation once payment settles.
#[derive(Clone)]
pub struct PaymentProcessedHandler {
    service: InventoryService,
}

impl PaymentProcessedHandler {
    pub fn new(service: InventoryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<PaymentProcessed> for PaymentProcessedHandler {
    async fn handle(&self, event: PaymentProcessed) -> Result<(), BoxError> {
        let order_id = OrderId::new(event.order_id);
        if let Err(e) = self
            .service
            .finalize_reservation(&order_id, event.success)
            .await
        {
            warn!(order_id = %order_id, success = event.success, error = %e, "Finalize failed");
            return Err(e.into());
        }
        Ok(())
    }
}
