use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use parking_lot::RwLock;

use super::InventoryRepository;
use crate::error::{InventoryError, Result};
use crate::models::{Category, Product, ProductPage, ProductQuery, StockRecord};
use crate::seed;

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    stocks: HashMap<ProductId, StockRecord>,
    categories: Vec<Category>,
}

/// In-memory inventory store. Every stock mutation runs under one write lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryRepository {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository preloaded with the demo catalog.
    pub fn with_sample_catalog() -> Self {
        let repo = Self::new();
        repo.seed(seed::categories(), seed::products(), seed::stocks());
        repo
    }

    /// Adds or replaces catalog entries and stock records.
    pub fn seed(&self, categories: Vec<Category>, products: Vec<Product>, stocks: Vec<StockRecord>) {
        let mut state = self.state.write();
        for category in categories {
            state.categories.retain(|c| c.id != category.id);
            state.categories.push(category);
        }
        for product in products {
            state.products.insert(product.id.clone(), product);
        }
        for stock in stocks {
            state.stocks.insert(stock.product_id().clone(), stock);
        }
    }

    /// Adds a bare stock record for a product.
    pub fn add_stock(&self, product_id: impl Into<ProductId>, available: u32) {
        let stock = StockRecord::new(product_id, available);
        self.state
            .write()
            .stocks
            .insert(stock.product_id().clone(), stock);
    }

    fn mutate(
        &self,
        product_id: &ProductId,
        apply: impl FnOnce(&mut StockRecord) -> Result<()>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let stock = state
            .stocks
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::StockNotFound(product_id.clone()))?;
        apply(stock)
    }
}

fn matches_search(product: &Product, term: &str) -> bool {
    let term = term.to_lowercase();
    product.name.to_lowercase().contains(&term)
        || product.description.to_lowercase().contains(&term)
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        self.state
            .read()
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| InventoryError::ProductNotFound(id.clone()))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage> {
        let state = self.state.read();
        let mut matching: Vec<&Product> = state
            .products
            .values()
            .filter(|p| query.category().is_none_or(|c| p.category_id == c))
            .filter(|p| query.search_term().is_none_or(|s| matches_search(p, s)))
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len() as u32;
        let products = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();
        Ok(ProductPage { products, total })
    }

    async fn get_stock(&self, product_id: &ProductId) -> Result<StockRecord> {
        self.state
            .read()
            .stocks
            .get(product_id)
            .cloned()
            .ok_or_else(|| InventoryError::StockNotFound(product_id.clone()))
    }

    async fn get_stocks_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockRecord>> {
        let state = self.state.read();
        Ok(product_ids
            .iter()
            .filter_map(|id| state.stocks.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.mutate(product_id, |stock| stock.reserve(quantity))
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.mutate(product_id, |stock| stock.release(quantity))
    }

    async fn commit(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.mutate(product_id, |stock| stock.commit(quantity))
    }

    async fn get_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .state
            .read()
            .categories
            .iter()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}
