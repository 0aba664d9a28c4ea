//! Storage seam for catalog and stock data.

use std::collections::HashMap;

use async_trait::async_trait;
use common::ProductId;

use crate::error::Result;
use crate::models::{Category, Product, ProductPage, ProductQuery, StockRecord};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryInventoryRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresInventoryRepository;

/// Catalog reads and atomic per-product stock mutations.
///
/// `reserve`, `release` and `commit` must each be atomic for one product so
/// concurrent callers can never oversell.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> Result<Product>;

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage>;

    async fn get_stock(&self, product_id: &ProductId) -> Result<StockRecord>;

    /// Missing products are absent from the returned map.
    async fn get_stocks_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockRecord>>;

    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    async fn commit(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    async fn get_categories(&self, active_only: bool) -> Result<Vec<Category>>;
}
