//! Order service: creation, queries, status changes and item edits.

use std::sync::Arc;

use chrono::Utc;
use common::{Money, OrderId, ProductId, UserId};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OrderError, Result};
use crate::order::Order;
use crate::publisher::OrderEventsPublisher;
use crate::repository::{OrderPage, OrderRepository};
use crate::status::OrderStatus;

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price in minor units of the order currency.
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: String,
    pub currency: String,
}

/// A line added to an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
}

/// Service for managing orders.
#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    publisher: Option<OrderEventsPublisher>,
}

impl OrderService {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self {
            repo,
            publisher: None,
        }
    }

    /// Publishes `OrderCreated` through `publisher` after each creation.
    pub fn with_publisher(mut self, publisher: OrderEventsPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Validates and stores a new pending order, then announces it.
    ///
    /// Publishing is best-effort: the order exists even if the event could
    /// not be enqueued.
    #[tracing::instrument(skip(self, req), fields(user_id = %req.user_id, items = req.items.len()))]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order> {
        if req.user_id.as_str().is_empty() {
            return Err(OrderError::UserIdRequired);
        }
        if req.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if req.shipping_address.trim().is_empty() {
            return Err(OrderError::ShippingAddressRequired);
        }
        if req.currency.trim().is_empty() {
            return Err(OrderError::CurrencyRequired);
        }

        // Lines are checked before a number is spent on the order.
        let mut order = Order::new(
            OrderId::generate(),
            req.user_id,
            0,
            &req.currency,
            req.shipping_address,
            Utc::now(),
        )?;
        let currency = order.currency().to_string();
        for item in req.items {
            let price = Money::new(item.price, currency.as_str())
                .map_err(|_| OrderError::CurrencyRequired)?;
            order.add_item(item.product_id, item.product_name, item.quantity, price)?;
        }

        let number = self.repo.next_order_number(order.user_id()).await?;
        order.set_number(number);
        self.repo.create(&order).await?;

        counter!("orders_created_total").increment(1);
        info!(
            order_id = %order.id(),
            number,
            total = %order.total(),
            "Order created"
        );

        if let Some(publisher) = &self.publisher
            && let Err(e) = publisher.publish_order_created(&order)
        {
            warn!(order_id = %order.id(), error = %e, "Failed to publish OrderCreated");
        }
        Ok(order)
    }

    /// Fetches an order owned by `user_id`.
    pub async fn get_order(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order> {
        self.owned_order(order_id, user_id).await
    }

    /// Lists a user's orders, newest first.
    ///
    /// `page` below 1 means 1; `limit` outside 1..=100 means 10.
    pub async fn get_user_orders(&self, user_id: &UserId, page: u32, limit: u32) -> Result<OrderPage> {
        let page = page.max(1);
        let limit = if (1..=Self::MAX_PAGE_SIZE).contains(&limit) {
            limit
        } else {
            Self::DEFAULT_PAGE_SIZE
        };
        self.repo.get_by_user_id(user_id, page, limit).await
    }

    /// Applies a status transition checked against the transition table.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.repo.get_by_id(order_id).await?;
        let from = order.status();
        order.update_status(status)?;
        order.touch(Utc::now());
        self.repo.update(&order).await?;

        counter!("orders_status_changes_total", "status" => status.as_str()).increment(1);
        info!(%from, to = %status, "Order status updated");
        Ok(order)
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order> {
        let mut order = self.owned_order(order_id, user_id).await?;
        order.cancel()?;
        order.touch(Utc::now());
        self.repo.update(&order).await?;

        counter!("orders_status_changes_total", "status" => OrderStatus::Cancelled.as_str())
            .increment(1);
        info!("Order cancelled by user");
        Ok(order)
    }

    #[tracing::instrument(skip(self, order_id, req), fields(order_id = %order_id, product_id = %req.product_id))]
    pub async fn add_item_to_order(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        req: AddItemRequest,
    ) -> Result<Order> {
        let mut order = self.owned_order(order_id, user_id).await?;
        order.add_item(req.product_id, req.product_name, req.quantity, req.price)?;
        order.touch(Utc::now());
        self.repo.update(&order).await?;
        Ok(order)
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn remove_item_from_order(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Order> {
        let mut order = self.owned_order(order_id, user_id).await?;
        order.remove_item(product_id)?;
        order.touch(Utc::now());
        self.repo.update(&order).await?;
        Ok(order)
    }

    async fn owned_order(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order> {
        let order = self.repo.get_by_id(order_id).await?;
        if order.user_id() != user_id {
            return Err(OrderError::AccessDenied);
        }
        Ok(order)
    }
}
