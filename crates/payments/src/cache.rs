//! Order totals remembered between `OrderCreated` and `StockReserved`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
struct CachedTotal {
    total: Money,
    expires_at: Option<Instant>,
}

/// In-memory cache of order totals with per-entry TTL.
///
/// Expired entries are dropped lazily on read and by [`purge_expired`].
///
/// [`purge_expired`]: OrderTotalsCache::purge_expired
#[derive(Debug, Clone, Default)]
pub struct OrderTotalsCache {
    entries: Arc<Mutex<HashMap<OrderId, CachedTotal>>>,
    inserted: Arc<Notify>,
}

impl OrderTotalsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `total`; a zero `ttl` keeps it until removed.
    pub fn set(&self, order_id: &OrderId, total: Money, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(order_id.clone(), CachedTotal { total, expires_at });
        self.inserted.notify_waiters();
    }

    pub fn get(&self, order_id: &OrderId) -> Option<Money> {
        let mut entries = self.entries.lock();
        let entry = entries.get(order_id)?;
        if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
            entries.remove(order_id);
            return None;
        }
        Some(entry.total.clone())
    }

    /// Returns the total once it is cached, giving up after `wait`.
    pub async fn wait_for(&self, order_id: &OrderId, wait: Duration) -> Option<Money> {
        let deadline = Instant::now() + wait;
        loop {
            let inserted = self.inserted.notified();
            if let Some(total) = self.get(order_id) {
                return Some(total);
            }
            if tokio::time::timeout_at(deadline, inserted).await.is_err() {
                return self.get(order_id);
            }
        }
    }

    pub fn remove(&self, order_id: &OrderId) -> Option<Money> {
        self.entries.lock().remove(order_id).map(|entry| entry.total)
    }

    /// Drops every expired entry and returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = OrderTotalsCache::new();
        let order = OrderId::new("order-1");
        cache.set(&order, Money::usd(19998), Duration::from_secs(60));
        cache.set(&OrderId::new("order-2"), Money::usd(5), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get(&order), Some(Money::usd(19998)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&order), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_sees_late_total() {
        let cache = OrderTotalsCache::new();
        let order = OrderId::new("order-1");

        let writer = cache.clone();
        let late = order.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            writer.set(&OrderId::new("other"), Money::usd(1), Duration::ZERO);
            tokio::time::sleep(Duration::from_millis(300)).await;
            writer.set(&late, Money::usd(19998), Duration::ZERO);
        });

        let started = Instant::now();
        let total = cache.wait_for(&order, Duration::from_secs(2)).await;
        assert_eq!(total, Some(Money::usd(19998)));
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(
            cache.wait_for(&OrderId::new("never"), Duration::from_secs(2)).await,
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = OrderTotalsCache::new();
        cache.set(&OrderId::new("a"), Money::usd(1), Duration::from_secs(1));
        cache.set(&OrderId::new("b"), Money::usd(2), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.remove(&OrderId::new("b")), Some(Money::usd(2)));
        assert!(cache.is_empty());
    }
}
