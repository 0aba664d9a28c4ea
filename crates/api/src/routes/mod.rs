//! Route handlers, one module per resource.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use inventory::InventoryService;
use ::orders::OrderService;
use ::payments::PaymentService;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub inventory: InventoryService,
    pub payments: PaymentService,
}

impl AppState {
    /// Shares the services of a running platform with the HTTP layer.
    pub fn from_platform<B: saga::BrokerConnector>(platform: &saga::FulfillmentPlatform<B>) -> Self {
        Self {
            orders: platform.orders().clone(),
            inventory: platform.inventory().clone(),
            payments: platform.payments().clone(),
        }
    }
}
