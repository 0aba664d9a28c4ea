//! Storage seam for orders.

use async_trait::async_trait;
use common::{OrderId, UserId};
use serde::Serialize;

use crate::error::Result;
use crate::order::Order;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryOrderRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresOrderRepository;

/// One page of a user's orders, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<()>;

    async fn get_by_id(&self, id: &OrderId) -> Result<Order>;

    /// `page` starts at 1.
    async fn get_by_user_id(&self, user_id: &UserId, page: u32, limit: u32) -> Result<OrderPage>;

    async fn update(&self, order: &Order) -> Result<()>;

    /// Allocates the user's next order number.
    ///
    /// Allocation for one user is serialized; different users do not wait on
    /// each other. Numbers are strictly increasing per user.
    async fn next_order_number(&self, user_id: &UserId) -> Result<i64>;
}
