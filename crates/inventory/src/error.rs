use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors raised by stock records, repositories and the inventory service.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Stock record not found for product {0}")]
    StockNotFound(ProductId),

    /// Not enough available stock to reserve.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Not enough reserved stock to release or commit.
    #[error("Insufficient reserved stock for {product_id}: requested {requested}, reserved {reserved}")]
    InsufficientReserved {
        product_id: ProductId,
        requested: u32,
        reserved: u32,
    },

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A live reservation already exists for the order.
    #[error("Order {0} already has an active reservation")]
    DuplicateReservation(OrderId),

    /// The reservation task panicked or was aborted.
    #[error("Reservation task failed: {0}")]
    TaskFailed(String),

    /// Several per-item operations failed; the others were applied.
    #[error("{} item operations failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<InventoryError>),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl InventoryError {
    /// Folds per-item failures into one result.
    pub fn aggregate(mut errors: Vec<InventoryError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(InventoryError::Multiple(errors)),
        }
    }

    /// True for not-found style errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InventoryError::ProductNotFound(_) | InventoryError::StockNotFound(_)
        )
    }
}

fn join_errors(errors: &[InventoryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_keeps_single_error_unwrapped() {
        assert!(InventoryError::aggregate(vec![]).is_ok());

        let single = InventoryError::aggregate(vec![InventoryError::StockNotFound(
            ProductId::new("prod-1"),
        )]);
        assert!(matches!(single, Err(InventoryError::StockNotFound(_))));

        let many = InventoryError::aggregate(vec![
            InventoryError::StockNotFound(ProductId::new("prod-1")),
            InventoryError::StockNotFound(ProductId::new("prod-2")),
        ])
        .unwrap_err();
        assert!(many.to_string().starts_with("2 item operations failed"));
        assert!(many.to_string().contains("prod-2"));
    }
}
