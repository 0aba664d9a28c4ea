//! PostgreSQL repository tests.
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p inventory --features postgres --test postgres_integration
//! ```

#![cfg(feature = "postgres")]

use std::sync::Arc;

use common::{OrderId, ProductId, UserId};
use inventory::{
    InventoryConfig, InventoryError, InventoryRepository, InventoryService,
    PostgresInventoryRepository, ProductQuery, StockItem, StockRecord, seed,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresInventoryRepository::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool over truncated tables, seeded with the demo catalog.
async fn get_test_repo() -> PostgresInventoryRepository {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE stocks, products, categories")
        .execute(&pool)
        .await
        .unwrap();

    let repo = PostgresInventoryRepository::new(pool);
    repo.seed(&seed::categories(), &seed::products(), &seed::stocks())
        .await
        .unwrap();
    repo
}

#[tokio::test]
#[serial]
async fn catalog_reads() {
    let repo = get_test_repo().await;

    let product = repo.get_product(&ProductId::new("prod-1")).await.unwrap();
    assert_eq!(product.name, "Wireless Headphones");

    let page = repo
        .list_products(&ProductQuery {
            category_id: Some("cat-1".to_string()),
            ..ProductQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let categories = repo.get_categories(true).await.unwrap();
    assert_eq!(categories.len(), 2);

    let err = repo
        .get_product(&ProductId::new("prod-404"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[serial]
async fn guarded_updates_reject_overdraw() {
    let repo = get_test_repo().await;
    let id = ProductId::new("prod-2");

    repo.reserve(&id, 1).await.unwrap();
    let err = repo.reserve(&id, 1).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::InsufficientStock { available: 0, .. }
    ));

    let err = repo.commit(&id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::InsufficientReserved { reserved: 1, .. }
    ));

    repo.release(&id, 1).await.unwrap();
    let stock = repo.get_stock(&id).await.unwrap();
    assert_eq!(stock, StockRecord::from_parts(id, 1, 0));
}

#[tokio::test]
#[serial]
async fn concurrent_reservations_never_oversell() {
    let repo = get_test_repo().await;
    let service = InventoryService::new(Arc::new(repo), InventoryConfig::without_expiry());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .reserve_stock(
                    &OrderId::new(format!("order-{i}")),
                    &UserId::new("user-1"),
                    &[StockItem::new("prod-1", 1)],
                )
                .await
                .unwrap()
                .is_complete()
        }));
    }

    let mut complete = 0;
    for task in tasks {
        if task.await.unwrap() {
            complete += 1;
        }
    }

    // prod-1 is seeded with 3 units.
    assert_eq!(complete, 3);
    let stock = service.get_stock(&ProductId::new("prod-1")).await.unwrap();
    assert_eq!(stock.available_quantity(), 0);
    assert_eq!(stock.reserved_quantity(), 3);
}
