use common::{OrderId, ProductId};
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors raised by the order aggregate, repositories and service.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("User ID is required")]
    UserIdRequired,

    #[error("Order must contain at least one item")]
    NoItems,

    #[error("Shipping address is required")]
    ShippingAddressRequired,

    #[error("Currency is required")]
    CurrencyRequired,

    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Invalid price for {product_id}: {price} (cannot be negative)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// An order holds amounts in one currency only.
    #[error("Mixed currencies are not supported in a single order: {expected} vs {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Cannot modify cancelled order")]
    OrderCancelled,

    #[error("Item not found: {0}")]
    ItemNotFound(ProductId),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot cancel delivered order")]
    CannotCancelDelivered,

    #[error("Order already cancelled")]
    AlreadyCancelled,

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The order belongs to another user.
    #[error("Access denied")]
    AccessDenied,

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OrderError {
    /// True for failures caused by the request rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::UserIdRequired
                | OrderError::NoItems
                | OrderError::ShippingAddressRequired
                | OrderError::CurrencyRequired
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::CurrencyMismatch { .. }
                | OrderError::UnknownStatus(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
