//! Catalog and stock models owned by the inventory service.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: String,
    pub category_name: String,
    pub image_url: String,
    pub is_active: bool,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

/// A product id and a quantity, as requested by an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Available and reserved counters for one product.
///
/// Counters only move through [`reserve`](Self::reserve),
/// [`release`](Self::release) and [`commit`](Self::commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    product_id: ProductId,
    available_quantity: u32,
    reserved_quantity: u32,
}

impl StockRecord {
    /// A fresh record with nothing reserved.
    pub fn new(product_id: impl Into<ProductId>, available_quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            available_quantity,
            reserved_quantity: 0,
        }
    }

    /// Rebuilds a record from persisted counters.
    pub fn from_parts(product_id: ProductId, available_quantity: u32, reserved_quantity: u32) -> Self {
        Self {
            product_id,
            available_quantity,
            reserved_quantity,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn available_quantity(&self) -> u32 {
        self.available_quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    pub fn can_reserve(&self, quantity: u32) -> bool {
        quantity > 0 && self.available_quantity >= quantity
    }

    /// Moves `quantity` from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        if self.available_quantity < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: self.product_id.clone(),
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.available_quantity -= quantity;
        self.reserved_quantity += quantity;
        Ok(())
    }

    /// Moves `quantity` from reserved back to available.
    pub fn release(&mut self, quantity: u32) -> Result<()> {
        self.check_reserved(quantity)?;
        self.reserved_quantity -= quantity;
        self.available_quantity += quantity;
        Ok(())
    }

    /// Finalizes a sale: reserved stock leaves the warehouse.
    pub fn commit(&mut self, quantity: u32) -> Result<()> {
        self.check_reserved(quantity)?;
        self.reserved_quantity -= quantity;
        Ok(())
    }

    fn check_positive(&self, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity: 0,
            });
        }
        Ok(())
    }

    fn check_reserved(&self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        if self.reserved_quantity < quantity {
            return Err(InventoryError::InsufficientReserved {
                product_id: self.product_id.clone(),
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        Ok(())
    }
}

/// Filters for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl ProductQuery {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Page is at least 1; a zero limit becomes the default.
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u32 {
        if self.limit == 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Category filter, ignoring blanks.
    pub fn category(&self) -> Option<&str> {
        self.category_id.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Trimmed search term, ignoring blanks.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One page of products and the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_commit_release_complement() {
        let mut committed = StockRecord::new("prod-1", 5);
        committed.reserve(2).unwrap();
        assert_eq!(
            (committed.available_quantity(), committed.reserved_quantity()),
            (3, 2)
        );
        committed.commit(2).unwrap();
        assert_eq!(
            (committed.available_quantity(), committed.reserved_quantity()),
            (3, 0)
        );

        let mut released = StockRecord::new("prod-1", 5);
        released.reserve(2).unwrap();
        released.release(2).unwrap();
        assert_eq!(
            (released.available_quantity(), released.reserved_quantity()),
            (5, 0)
        );
    }

    #[test]
    fn test_reserve_rejects_zero_and_oversell() {
        let mut stock = StockRecord::new("prod-1", 1);
        assert!(!stock.can_reserve(0));
        assert!(matches!(
            stock.reserve(0),
            Err(InventoryError::InvalidQuantity { .. })
        ));

        let err = stock.reserve(2).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(stock.available_quantity(), 1);
    }

    #[test]
    fn test_release_and_commit_need_reserved_stock() {
        let mut stock = StockRecord::new("prod-1", 4);
        stock.reserve(1).unwrap();

        assert!(matches!(
            stock.release(2),
            Err(InventoryError::InsufficientReserved { reserved: 1, .. })
        ));
        assert!(matches!(
            stock.commit(2),
            Err(InventoryError::InsufficientReserved { .. })
        ));
        assert_eq!(stock.reserved_quantity(), 1);
        assert_eq!(stock.available_quantity(), 3);
    }

    #[test]
    fn test_product_query_defaults() {
        let query = ProductQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 10);
        assert_eq!(query.offset(), 0);

        let query = ProductQuery {
            page: 3,
            limit: 5,
            search: Some("  ".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(query.offset(), 10);
        assert_eq!(query.search_term(), None);
    }
}
