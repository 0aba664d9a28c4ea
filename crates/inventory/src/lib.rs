//! Inventory service for the fulfillment saga.
//!
//! Owns the product catalog and per-product stock counters. Orders reserve
//! stock when they are created; the reservation is committed or released
//! when payment settles, or released when it outlives its TTL.
//!
//! Storage sits behind [`InventoryRepository`]: an in-memory implementation
//! is always available, the `postgres` feature adds one backed by `sqlx`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod publisher;
pub mod repository;
pub mod seed;
pub mod service;

pub use config::InventoryConfig;
pub use error::{InventoryError, Result};
pub use handlers::{OrderCreatedHandler, PaymentProcessedHandler};
pub use ledger::{Claim, ReservationLedger};
pub use models::{Category, Product, ProductPage, ProductQuery, StockItem, StockRecord};
pub use publisher::{INSUFFICIENT_STOCK, StockEventsPublisher};
#[cfg(feature = "postgres")]
pub use repository::PostgresInventoryRepository;
pub use repository::{InMemoryInventoryRepository, InventoryRepository};
pub use service::{
    InventoryService, ReservationOutcome, StockCheck, StockCheckResult, StockShortage,
};
