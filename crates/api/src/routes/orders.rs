//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, OrderId, ProductId, UserId};
use orders::{AddItemRequest, CreateOrderRequest, Order, OrderPage, OrderService};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

/// Identifies the caller for endpoints scoped to one user's orders.
#[derive(Deserialize)]
pub struct UserParams {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct AddItemBody {
    pub user_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub number: i64,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: i64,
    pub currency: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            number: order.number(),
            status: order.status().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price.amount(),
                    line_total: item.line_total.amount(),
                })
                .collect(),
            total_amount: order.total().amount(),
            currency: order.currency().to_string(),
            shipping_address: order.shipping_address().to_string(),
            created_at: order.created_at().to_rfc3339(),
            updated_at: order.updated_at().to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders: create an order and announce it to the other services.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/{id}?user_id=: load one of the caller's orders.
#[tracing::instrument(skip(state, params))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = require_user(params.user_id)?;
    let order = state.orders.get_order(&OrderId::new(id), &user_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /users/{user_id}/orders: a page of the user's orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(OrderService::DEFAULT_PAGE_SIZE);
    let OrderPage { orders, total } = state
        .orders
        .get_user_orders(&UserId::new(user_id), page, limit)
        .await?;

    Ok(Json(OrderListResponse {
        orders: orders.iter().map(OrderResponse::from).collect(),
        total,
        page: page.max(1),
        limit: if (1..=OrderService::MAX_PAGE_SIZE).contains(&limit) {
            limit
        } else {
            OrderService::DEFAULT_PAGE_SIZE
        },
    }))
}

/// POST /orders/{id}/cancel: cancel one of the caller's orders.
#[tracing::instrument(skip(state, params))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<UserParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = require_user(params.user_id)?;
    let order = state.orders.cancel_order(&OrderId::new(id), &user_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/items: add a line, or more units of an existing one.
#[tracing::instrument(skip(state, body), fields(product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddItemBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::new(id);
    let user_id = require_user(Some(body.user_id))?;
    let currency = state.orders.get_order(&order_id, &user_id).await?.currency().to_string();
    let price = Money::new(body.price, currency).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .orders
        .add_item_to_order(
            &order_id,
            &user_id,
            AddItemRequest {
                product_id: ProductId::new(body.product_id),
                product_name: body.product_name,
                quantity: body.quantity,
                price,
            },
        )
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// DELETE /orders/{id}/items/{product_id}?user_id=: drop a line.
#[tracing::instrument(skip(state, params))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(String, String)>,
    Query(params): Query<UserParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = require_user(params.user_id)?;
    let order = state
        .orders
        .remove_item_from_order(&OrderId::new(id), &user_id, &ProductId::new(product_id))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn require_user(user_id: Option<String>) -> Result<UserId, ApiError> {
    user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(UserId::new)
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))
}
