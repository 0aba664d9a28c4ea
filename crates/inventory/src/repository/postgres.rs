use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::InventoryRepository;
use crate::error::{InventoryError, Result};
use crate::models::{Category, Product, ProductPage, ProductQuery, StockRecord};

/// PostgreSQL-backed inventory repository.
///
/// Stock mutations are single conditional `UPDATE`s guarded by the counter
/// they debit, so concurrent reservations cannot oversell.
#[derive(Clone)]
pub struct PostgresInventoryRepository {
    pool: PgPool,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the inventory tables if they do not exist.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!(
            "../../../../migrations/001_create_inventory_tables.sql"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let currency: String = row.try_get("currency")?;
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::new(row.try_get("price_minor")?, currency)
                .unwrap_or_else(|_| Money::usd(0)),
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            image_url: row.try_get("image_url")?,
            is_active: row.try_get("is_active")?,
        })
    }

    fn row_to_stock(row: &PgRow) -> Result<StockRecord> {
        let available: i32 = row.try_get("available_quantity")?;
        let reserved: i32 = row.try_get("reserved_quantity")?;
        Ok(StockRecord::from_parts(
            ProductId::new(row.try_get::<String, _>("product_id")?),
            available.max(0) as u32,
            reserved.max(0) as u32,
        ))
    }

    fn db_quantity(product_id: &ProductId, quantity: u32) -> Result<i32> {
        match i32::try_from(quantity) {
            Ok(q) if q > 0 => Ok(q),
            _ => Err(InventoryError::InvalidQuantity {
                product_id: product_id.clone(),
                quantity: i64::from(quantity),
            }),
        }
    }

    /// Explains why a guarded update touched no row.
    async fn explain_miss(
        &self,
        product_id: &ProductId,
        quantity: u32,
        debits_available: bool,
    ) -> InventoryError {
        match self.get_stock(product_id).await {
            Ok(stock) if debits_available => InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: stock.available_quantity(),
            },
            Ok(stock) => InventoryError::InsufficientReserved {
                product_id: product_id.clone(),
                requested: quantity,
                reserved: stock.reserved_quantity(),
            },
            Err(e) => e,
        }
    }

    /// Upserts catalog rows and stock counters.
    pub async fn seed(
        &self,
        categories: &[Category],
        products: &[Product],
        stocks: &[StockRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO categories (id, name, description, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, description = EXCLUDED.description, is_active = EXCLUDED.is_active
                "#,
            )
            .bind(&category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.is_active)
            .execute(&mut *tx)
            .await?;
        }
        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, description, price_minor, currency, category_id, category_name, image_url, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.amount())
            .bind(product.price.currency())
            .bind(&product.category_id)
            .bind(&product.category_name)
            .bind(&product.image_url)
            .bind(product.is_active)
            .execute(&mut *tx)
            .await?;
        }
        for stock in stocks {
            sqlx::query(
                r#"
                INSERT INTO stocks (product_id, available_quantity, reserved_quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (product_id) DO NOTHING
                "#,
            )
            .bind(stock.product_id().as_str())
            .bind(stock.available_quantity() as i32)
            .bind(stock.reserved_quantity() as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_minor, currency, category_id, category_name, image_url, is_active
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| InventoryError::ProductNotFound(id.clone()))?;

        Self::row_to_product(row)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage> {
        let category = query.category();
        let pattern = query.search_term().map(|s| format!("%{s}%"));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products
            WHERE ($1::text IS NULL OR category_id = $1)
              AND ($2::text IS NULL OR LOWER(name) LIKE LOWER($2) OR LOWER(description) LIKE LOWER($2))
            "#,
        )
        .bind(category)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_minor, currency, category_id, category_name, image_url, is_active
            FROM products
            WHERE ($1::text IS NULL OR category_id = $1)
              AND ($2::text IS NULL OR LOWER(name) LIKE LOWER($2) OR LOWER(description) LIKE LOWER($2))
            ORDER BY name ASC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(category)
        .bind(pattern.as_deref())
        .bind(query.offset() as i64)
        .bind(i64::from(query.limit()))
        .fetch_all(&self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(Self::row_to_product)
            .collect::<Result<Vec<_>>>()?;
        Ok(ProductPage {
            products,
            total: total.max(0) as u32,
        })
    }

    async fn get_stock(&self, product_id: &ProductId) -> Result<StockRecord> {
        let row = sqlx::query(
            "SELECT product_id, available_quantity, reserved_quantity FROM stocks WHERE product_id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| InventoryError::StockNotFound(product_id.clone()))?;

        Self::row_to_stock(&row)
    }

    async fn get_stocks_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockRecord>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<&str> = product_ids.iter().map(ProductId::as_str).collect();
        let rows = sqlx::query(
            "SELECT product_id, available_quantity, reserved_quantity FROM stocks WHERE product_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_stock(row).map(|s| (s.product_id().clone(), s)))
            .collect()
    }

    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let qty = Self::db_quantity(product_id, quantity)?;
        let result = sqlx::query(
            r#"
            UPDATE stocks
            SET available_quantity = available_quantity - $2,
                reserved_quantity = reserved_quantity + $2
            WHERE product_id = $1 AND available_quantity >= $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(qty)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(product_id, quantity, true).await);
        }
        Ok(())
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let qty = Self::db_quantity(product_id, quantity)?;
        let result = sqlx::query(
            r#"
            UPDATE stocks
            SET available_quantity = available_quantity + $2,
                reserved_quantity = reserved_quantity - $2
            WHERE product_id = $1 AND reserved_quantity >= $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(qty)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(product_id, quantity, false).await);
        }
        Ok(())
    }

    async fn commit(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let qty = Self::db_quantity(product_id, quantity)?;
        let result = sqlx::query(
            r#"
            UPDATE stocks
            SET reserved_quantity = reserved_quantity - $2
            WHERE product_id = $1 AND reserved_quantity >= $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(qty)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(product_id, quantity, false).await);
        }
        Ok(())
    }

    async fn get_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, is_active
            FROM categories
            WHERE NOT $1 OR is_active
            ORDER BY name ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }
}
