//! Order fulfillment as a choreographed saga.
//!
//! The order, inventory and payment services never call each other. An
//! order moves forward through the events they exchange:
//!
//! 1. `OrderCreated`: inventory reserves stock, payments caches the total
//! 2. `StockReserved`: payments charges the order
//! 3. `PaymentProcessed`: orders confirms or cancels, inventory commits or
//!    releases the reservation
//!
//! [`FulfillmentPlatform`] runs all three over one broker.

pub mod config;
pub mod connector;
pub mod error;
pub mod platform;

pub use config::PlatformConfig;
#[cfg(feature = "kafka")]
pub use connector::KafkaConnector;
pub use connector::BrokerConnector;
pub use error::{PlatformError, Result};
pub use platform::{
    Backends, FulfillmentPlatform, INVENTORY_GROUP, ORDER_GROUP, PAYMENT_GROUP,
};
