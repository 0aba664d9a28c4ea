//! PostgreSQL repository tests.
//!
//! ```bash
//! cargo test -p orders --features postgres --test postgres_integration
//! ```

#![cfg(feature = "postgres")]

use std::collections::HashSet;
use std::sync::Arc;

use common::{ProductId, UserId};
use orders::{
    CreateOrderRequest, OrderItemRequest, OrderRepository, OrderService, OrderStatus,
    PostgresOrderRepository,
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
            PostgresOrderRepository::new(pool.clone())
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

async fn get_test_repo() -> PostgresOrderRepository {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, order_sequences")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderRepository::new(pool)
}

fn request(user: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: UserId::new(user),
        items: vec![
            OrderItemRequest {
                product_id: ProductId::new("prod-1"),
                product_name: "Wireless Headphones".to_string(),
                quantity: 2,
                price: 9999,
            },
            OrderItemRequest {
                product_id: ProductId::new("prod-3"),
                product_name: "Coffee Mug".to_string(),
                quantity: 1,
                price: 1599,
            },
        ],
        shipping_address: "1 Main St".to_string(),
        currency: "USD".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn order_round_trips_with_items() {
    let repo = get_test_repo().await;
    let service = OrderService::new(Arc::new(repo.clone()));

    let created = service.create_order(request("user-1")).await.unwrap();
    let loaded = repo.get_by_id(created.id()).await.unwrap();

    assert_eq!(loaded.items(), created.items());
    assert_eq!(loaded.total(), created.total());
    assert_eq!(loaded.number(), 1);
    assert_eq!(loaded.status(), OrderStatus::Pending);

    service
        .update_order_status(created.id(), OrderStatus::Confirmed)
        .await
        .unwrap();
    let loaded = repo.get_by_id(created.id()).await.unwrap();
    assert_eq!(loaded.status(), OrderStatus::Confirmed);
}

#[tokio::test]
#[serial]
async fn user_orders_are_paged() {
    let repo = get_test_repo().await;
    let service = OrderService::new(Arc::new(repo));
    for _ in 0..3 {
        service.create_order(request("user-1")).await.unwrap();
    }
    service.create_order(request("user-2")).await.unwrap();

    let page = service
        .get_user_orders(&UserId::new("user-1"), 1, 2)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.orders.len(), 2);
    assert_eq!(page.orders[0].items().len(), 2);
}

#[tokio::test]
#[serial]
async fn concurrent_number_allocation_is_serialized_per_user() {
    let repo = get_test_repo().await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.next_order_number(&UserId::new("user-1")).await.unwrap()
        }));
    }

    let mut numbers = HashSet::new();
    for task in tasks {
        numbers.insert(task.await.unwrap());
    }
    assert_eq!(numbers, (1..=10).collect::<HashSet<i64>>());
}
