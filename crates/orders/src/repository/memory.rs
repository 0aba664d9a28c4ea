use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use parking_lot::{Mutex, RwLock};

use super::{OrderPage, OrderRepository};
use crate::error::{OrderError, Result};
use crate::order::Order;

/// In-memory order store.
///
/// Order numbers come from a per-user counter behind its own async mutex, so
/// allocation for one user never blocks another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    sequences: Arc<Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<Option<i64>>>>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    fn sequence(&self, user_id: &UserId) -> Arc<tokio::sync::Mutex<Option<i64>>> {
        Arc::clone(self.sequences.lock().entry(user_id.clone()).or_default())
    }

    fn highest_number(&self, user_id: &UserId) -> i64 {
        self.orders
            .read()
            .values()
            .filter(|order| order.user_id() == user_id)
            .map(Order::number)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write();
        if orders.contains_key(order.id()) {
            return Err(OrderError::AlreadyExists(order.id().clone()));
        }
        orders.insert(order.id().clone(), order.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Order> {
        self.orders
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(id.clone()))
    }

    async fn get_by_user_id(&self, user_id: &UserId, page: u32, limit: u32) -> Result<OrderPage> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.number().cmp(&a.number()))
        });

        let total = orders.len() as u64;
        let offset = (page.max(1) as usize - 1) * limit as usize;
        let orders = orders.into_iter().skip(offset).take(limit as usize).collect();
        Ok(OrderPage { orders, total })
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write();
        match orders.get_mut(order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(OrderError::NotFound(order.id().clone())),
        }
    }

    async fn next_order_number(&self, user_id: &UserId) -> Result<i64> {
        let sequence = self.sequence(user_id);
        let mut last = sequence.lock().await;
        let next = match *last {
            Some(n) => n + 1,
            None => self.highest_number(user_id) + 1,
        };
        *last = Some(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::Money;

    use super::*;

    fn order(id: &str, user: &str, number: i64, minutes_ago: i64) -> Order {
        let mut order = Order::new(
            OrderId::new(id),
            UserId::new(user),
            number,
            "USD",
            "1 Main St",
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap();
        order
            .add_item(common::ProductId::new("prod-1"), "Headphones", 1, Money::usd(100))
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let repo = InMemoryOrderRepository::new();
        let mut o = order("order-1", "user-1", 1, 0);
        repo.create(&o).await.unwrap();
        assert!(matches!(
            repo.create(&o).await,
            Err(OrderError::AlreadyExists(_))
        ));

        o.cancel().unwrap();
        repo.update(&o).await.unwrap();
        assert_eq!(repo.get_by_id(o.id()).await.unwrap(), o);

        let missing = order("order-2", "user-1", 2, 0);
        assert!(matches!(
            repo.update(&missing).await,
            Err(OrderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_orders_are_paged_newest_first() {
        let repo = InMemoryOrderRepository::new();
        for i in 1..=5 {
            repo.create(&order(&format!("order-{i}"), "user-1", i, 10 - i))
                .await
                .unwrap();
        }
        repo.create(&order("order-x", "user-2", 1, 0)).await.unwrap();

        let page = repo
            .get_by_user_id(&UserId::new("user-1"), 2, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<&str> = page.orders.iter().map(|o| o.id().as_str()).collect();
        assert_eq!(ids, vec!["order-3", "order-2"]);
    }

    #[tokio::test]
    async fn test_numbers_continue_from_stored_orders() {
        let repo = InMemoryOrderRepository::new();
        repo.create(&order("order-1", "user-1", 7, 0)).await.unwrap();

        let user = UserId::new("user-1");
        assert_eq!(repo.next_order_number(&user).await.unwrap(), 8);
        assert_eq!(repo.next_order_number(&user).await.unwrap(), 9);
        assert_eq!(
            repo.next_order_number(&UserId::new("user-2")).await.unwrap(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocation_is_unique() {
        let repo = InMemoryOrderRepository::new();
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.next_order_number(&UserId::new("user-1")).await.unwrap()
            }));
        }

        let mut numbers = Vec::new();
        for task in tasks {
            numbers.push(task.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=50).collect::<Vec<i64>>());
    }
}
