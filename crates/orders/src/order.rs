//! Order aggregate.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};
use crate::status::OrderStatus;

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        let line_total = unit_price.multiply(quantity);
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_total,
        }
    }
}

/// Order aggregate root.
///
/// Owns its lines and keeps `total` equal to the sum of line totals. All
/// amounts share the order's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    /// Per-user sequence number, starting at 1.
    number: i64,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total: Money,
    shipping_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Query methods
impl Order {
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn get_item(&self, product_id: &ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Total quantity across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn total(&self) -> &Money {
        &self.total
    }

    pub fn currency(&self) -> &str {
        self.total.currency()
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Pending and confirmed orders can still be changed by the customer.
    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Starts an empty pending order.
    pub fn new(
        id: OrderId,
        user_id: UserId,
        number: i64,
        currency: &str,
        shipping_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if user_id.as_str().is_empty() {
            return Err(OrderError::UserIdRequired);
        }
        let shipping_address = shipping_address.into();
        if shipping_address.trim().is_empty() {
            return Err(OrderError::ShippingAddressRequired);
        }
        let total = Money::new(0, currency).map_err(|_| OrderError::CurrencyRequired)?;

        Ok(Self {
            id,
            user_id,
            number,
            status: OrderStatus::Pending,
            items: Vec::new(),
            total,
            shipping_address,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from storage.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: OrderId,
        user_id: UserId,
        number: i64,
        status: OrderStatus,
        items: Vec<OrderItem>,
        total: Money,
        shipping_address: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            number,
            status,
            items,
            total,
            shipping_address,
            created_at,
            updated_at,
        }
    }

    /// Adds a line, or grows the existing line for the same product.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<()> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::OrderCancelled);
        }
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        if unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id,
                price: unit_price.amount(),
            });
        }
        if unit_price.currency() != self.currency() {
            return Err(OrderError::CurrencyMismatch {
                expected: self.currency().to_string(),
                actual: unit_price.currency().to_string(),
            });
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(existing) => {
                existing.quantity += quantity;
                existing.line_total = existing.unit_price.multiply(existing.quantity);
            }
            None => self
                .items
                .push(OrderItem::new(product_id, product_name, quantity, unit_price)),
        }
        self.recalculate_total();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &ProductId) -> Result<()> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::OrderCancelled);
        }
        let position = self
            .items
            .iter()
            .position(|item| &item.product_id == product_id)
            .ok_or_else(|| OrderError::ItemNotFound(product_id.clone()))?;
        self.items.remove(position);
        self.recalculate_total();
        Ok(())
    }

    /// Moves to `next` if the transition table allows it.
    pub fn update_status(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Customer cancellation. Anything short of delivery can be cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        match self.status {
            OrderStatus::Delivered => Err(OrderError::CannotCancelDelivered),
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            _ => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub(crate) fn set_number(&mut self, number: i64) {
        self.number = number;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn recalculate_total(&mut self) {
        let amount = self.items.iter().map(|item| item.line_total.amount()).sum();
        self.total = self.total.with_amount(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_order() -> Order {
        Order::new(
            OrderId::new("order-1"),
            UserId::new("user-1"),
            1,
            "USD",
            "1 Main St",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_inputs() {
        let now = Utc::now();
        let id = || OrderId::new("order-1");
        assert!(matches!(
            Order::new(id(), UserId::new(""), 1, "USD", "addr", now),
            Err(OrderError::UserIdRequired)
        ));
        assert!(matches!(
            Order::new(id(), UserId::new("u"), 1, "USD", "  ", now),
            Err(OrderError::ShippingAddressRequired)
        ));
        assert!(matches!(
            Order::new(id(), UserId::new("u"), 1, "", "addr", now),
            Err(OrderError::CurrencyRequired)
        ));

        let order = pending_order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.total().is_zero());
    }

    #[test]
    fn test_add_item_recalculates_total() {
        let mut order = pending_order();
        order
            .add_item(ProductId::new("prod-1"), "Headphones", 2, Money::usd(9999))
            .unwrap();
        order
            .add_item(ProductId::new("prod-3"), "Mug", 1, Money::usd(1599))
            .unwrap();
        order
            .add_item(ProductId::new("prod-1"), "Headphones", 1, Money::usd(9999))
            .unwrap();

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.item_count(), 4);
        assert_eq!(order.get_item(&ProductId::new("prod-1")).unwrap().quantity, 3);
        assert_eq!(order.total().amount(), 3 * 9999 + 1599);
    }

    #[test]
    fn test_add_item_rejections() {
        let mut order = pending_order();
        let p = || ProductId::new("prod-1");

        assert!(matches!(
            order.add_item(p(), "x", 0, Money::usd(100)),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            order.add_item(p(), "x", 1, Money::usd(-1)),
            Err(OrderError::InvalidPrice { price: -1, .. })
        ));
        assert!(matches!(
            order.add_item(p(), "x", 1, Money::new(100, "EUR").unwrap()),
            Err(OrderError::CurrencyMismatch { .. })
        ));
        // Free items are fine.
        order.add_item(p(), "x", 1, Money::usd(0)).unwrap();

        order.cancel().unwrap();
        assert!(matches!(
            order.add_item(p(), "x", 1, Money::usd(100)),
            Err(OrderError::OrderCancelled)
        ));
    }

    #[test]
    fn test_remove_item() {
        let mut order = pending_order();
        order
            .add_item(ProductId::new("prod-1"), "Headphones", 1, Money::usd(9999))
            .unwrap();
        order
            .add_item(ProductId::new("prod-2"), "Watch", 1, Money::usd(19999))
            .unwrap();

        order.remove_item(&ProductId::new("prod-1")).unwrap();
        assert_eq!(order.total().amount(), 19999);
        assert!(matches!(
            order.remove_item(&ProductId::new("prod-1")),
            Err(OrderError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_update_status_follows_table() {
        let mut order = pending_order();
        assert!(matches!(
            order.update_status(OrderStatus::Shipped),
            Err(OrderError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            })
        ));

        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order.update_status(next).unwrap();
        }
        assert!(order.is_terminal());
        assert!(order.update_status(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_cancel_rules() {
        let mut order = pending_order();
        order.cancel().unwrap();
        assert!(matches!(order.cancel(), Err(OrderError::AlreadyCancelled)));

        let mut delivered = pending_order();
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            delivered.update_status(next).unwrap();
        }
        assert!(matches!(
            delivered.cancel(),
            Err(OrderError::CannotCancelDelivered)
        ));
    }
}
