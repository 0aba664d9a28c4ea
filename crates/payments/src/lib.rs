//! Payment service for the fulfillment saga.
//!
//! Charges an order once inventory has reserved its stock and publishes
//! `PaymentProcessed` with the outcome. The amount comes from the order
//! total seen earlier on `OrderCreated`.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod payment;
pub mod processor;
pub mod publisher;
pub mod service;

pub use cache::OrderTotalsCache;
pub use config::PaymentConfig;
pub use error::{PaymentError, Result};
pub use handlers::{OrderCreatedHandler, StockReservedHandler};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use processor::{
    MockDecision, MockPaymentProcessor, PaymentProcessor, ProcessRequest, ProcessResult,
    ProcessorError,
};
pub use publisher::PaymentEventsPublisher;
pub use service::{PaymentService, ProcessPaymentRequest, ProcessPaymentResponse};
