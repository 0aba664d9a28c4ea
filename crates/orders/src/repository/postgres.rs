use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::{OrderPage, OrderRepository};
use crate::error::{OrderError, Result};
use crate::order::{Order, OrderItem};
use crate::status::OrderStatus;

/// PostgreSQL-backed order repository.
///
/// Orders and their lines are written in one transaction. Order numbers are
/// allocated under a per-user advisory lock.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the order tables if they do not exist.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!(
            "../../../../migrations/002_create_orders_tables.sql"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let currency: String = row.try_get("currency")?;
        let quantity: i32 = row.try_get("quantity")?;
        let unit_price = Money::new(row.try_get("unit_price")?, currency)
            .map_err(|_| OrderError::CurrencyRequired)?;
        Ok(OrderItem::new(
            ProductId::new(row.try_get::<String, _>("product_id")?),
            row.try_get::<String, _>("product_name")?,
            quantity.max(0) as u32,
            unit_price,
        ))
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let currency: String = row.try_get("currency")?;
        let total = Money::new(row.try_get("total_amount")?, currency)
            .map_err(|_| OrderError::CurrencyRequired)?;
        Ok(Order::restore(
            OrderId::new(row.try_get::<String, _>("id")?),
            UserId::new(row.try_get::<String, _>("user_id")?),
            row.try_get("number")?,
            status.parse()?,
            items,
            total,
            row.try_get("shipping_address")?,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<DateTime<Utc>, _>("updated_at")?,
        ))
    }

    /// Loads lines for the given orders, grouped by order id.
    async fn load_items(&self, order_ids: &[String]) -> Result<HashMap<String, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price, currency
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let order_id: String = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(Self::row_to_item(row)?);
        }
        Ok(items)
    }

    async fn write_items(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id().as_str())
            .execute(&mut **tx)
            .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name, quantity, unit_price, currency)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_str())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.amount())
            .bind(item.unit_price.currency())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

const ORDER_COLUMNS: &str = "id, user_id, number, status, total_amount, currency, shipping_address, created_at, updated_at";

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, number, status, total_amount, currency, shipping_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(order.id().as_str())
        .bind(order.user_id().as_str())
        .bind(order.number())
        .bind(order.status().as_str())
        .bind(order.total().amount())
        .bind(order.currency())
        .bind(order.shipping_address())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::AlreadyExists(order.id().clone()));
        }

        Self::write_items(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Order> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;

        let mut items = self.load_items(&[id.as_str().to_string()]).await?;
        Self::row_to_order(&row, items.remove(id.as_str()).unwrap_or_default())
    }

    async fn get_by_user_id(&self, user_id: &UserId, page: u32, limit: u32) -> Result<OrderPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        let offset = i64::from(page.max(1) - 1) * i64::from(limit);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, number DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id.as_str())
        .bind(offset)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut items = self.load_items(&ids).await?;

        let orders = rows
            .iter()
            .zip(&ids)
            .map(|(row, id)| Self::row_to_order(row, items.remove(id).unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderPage {
            orders,
            total: total.max(0) as u64,
        })
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_amount = $3, currency = $4, shipping_address = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_str())
        .bind(order.status().as_str())
        .bind(order.total().amount())
        .bind(order.currency())
        .bind(order.shipping_address())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(order.id().clone()));
        }

        Self::write_items(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn next_order_number(&self, user_id: &UserId) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        // The sequence row covers numbers handed out but not yet stored.
        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT GREATEST(
                COALESCE((SELECT MAX(number) FROM orders WHERE user_id = $1), 0),
                COALESCE((SELECT last_number FROM order_sequences WHERE user_id = $1), 0)
            ) + 1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO order_sequences (user_id, last_number) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET last_number = EXCLUDED.last_number
            "#,
        )
        .bind(user_id.as_str())
        .bind(next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }
}
