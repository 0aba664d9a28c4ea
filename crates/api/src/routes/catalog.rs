//! Product catalog and stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::ProductId;
use inventory::{Category, Product, ProductQuery, StockCheck, StockItem};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ProductParams {
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct CategoryParams {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Deserialize)]
pub struct StockCheckRequest {
    pub items: Vec<StockItem>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub stock_quantity: u32,
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

/// GET /products: filter by category or search term, paginated.
#[tracing::instrument(skip(state, params))]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductParams>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let query = ProductQuery {
        category_id: params.category_id,
        search: params.search,
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(ProductQuery::DEFAULT_LIMIT),
    };
    let page = state.inventory.list_products(&query).await?;
    Ok(Json(ProductListResponse {
        products: page.products,
        total: page.total,
        page: query.page(),
        limit: query.limit(),
    }))
}

/// GET /products/{id}: product details with its available quantity.
#[tracing::instrument(skip(state))]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = ProductId::new(id);
    let product = state.inventory.get_product(&product_id).await?;
    // A product without a stock record is listed but not sellable.
    let stock_quantity = match state.inventory.get_stock_quantity(&product_id).await {
        Ok(quantity) => quantity,
        Err(e) if e.is_not_found() => 0,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ProductResponse {
        product,
        stock_quantity,
    }))
}

/// POST /stock/check: read-only availability check, nothing is reserved.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn check_stock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StockCheckRequest>,
) -> Result<Json<StockCheck>, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("items must not be empty".to_string()));
    }
    Ok(Json(state.inventory.check_stock(&req.items).await?))
}

/// GET /categories
#[tracing::instrument(skip(state, params))]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryParams>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.inventory.get_categories(params.active_only).await?))
}
