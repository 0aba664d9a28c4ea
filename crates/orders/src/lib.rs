//! Order service for the fulfillment saga.
//!
//! An [`Order`] moves through the [`OrderStatus`] state machine. New orders
//! are announced with `OrderCreated`; payment outcomes arriving as
//! `PaymentProcessed` confirm or cancel them.

pub mod error;
pub mod handlers;
pub mod order;
pub mod publisher;
pub mod repository;
pub mod service;
pub mod status;

pub use error::{OrderError, Result};
pub use handlers::PaymentProcessedHandler;
pub use order::{Order, OrderItem};
pub use publisher::OrderEventsPublisher;
#[cfg(feature = "postgres")]
pub use repository::PostgresOrderRepository;
pub use repository::{InMemoryOrderRepository, OrderPage, OrderRepository};
pub use service::{AddItemRequest, CreateOrderRequest, OrderItemRequest, OrderService};
pub use status::OrderStatus;
