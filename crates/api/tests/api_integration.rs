//! Integration tests for the HTTP gateway.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::OrderId;
use messaging::{ConsumerConfig, InMemoryBroker, MessagingConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{MockDecision, MockPaymentProcessor};
use saga::{Backends, FulfillmentPlatform, PlatformConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    platform: FulfillmentPlatform<InMemoryBroker>,
}

fn setup() -> TestApp {
    let config = PlatformConfig {
        messaging: MessagingConfig {
            consumer: ConsumerConfig {
                poll_timeout: Duration::from_millis(20),
                ..ConsumerConfig::default()
            },
            ..MessagingConfig::default()
        },
        ..PlatformConfig::default()
    };
    let backends = Backends {
        payment_processor: Arc::new(
            MockPaymentProcessor::new(MockDecision::ApproveAll)
                .with_latency(Duration::from_millis(5)),
        ),
        ..Backends::in_memory()
    };
    let platform = FulfillmentPlatform::start(&InMemoryBroker::new(), backends, config).unwrap();
    let app = api::create_app(
        Arc::new(AppState::from_platform(&platform)),
        get_metrics_handle(),
    );
    TestApp { app, platform }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_order(&self, user_id: &str, quantity: u32) -> Value {
        let (status, order) = self
            .send(
                "POST",
                "/orders",
                Some(json!({
                    "user_id": user_id,
                    "items": [{
                        "product_id": "prod-1",
                        "product_name": "Wireless Headphones",
                        "quantity": quantity,
                        "price": 9999
                    }],
                    "shipping_address": "1 Main St",
                    "currency": "USD"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }

    async fn wait_for_status(&self, order_id: &str, user_id: &str, expected: &str) {
        for _ in 0..300 {
            let (_, order) = self
                .send("GET", &format!("/orders/{order_id}?user_id={user_id}"), None)
                .await;
            if order["status"] == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("order {order_id} never reached {expected}");
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let (status, json) = t.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_and_get_order() {
    let t = setup();
    let created = t.create_order("user-1", 2).await;
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["number"], 1);
    assert_eq!(created["total_amount"], 19998);
    assert_eq!(created["items"][0]["line_total"], 19998);

    let order_id = created["id"].as_str().unwrap();
    let (status, order) = t
        .send("GET", &format!("/orders/{order_id}?user_id=user-1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["currency"], "USD");

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_get_order_checks_the_caller() {
    let t = setup();
    let created = t.create_order("user-1", 1).await;
    let order_id = created["id"].as_str().unwrap();

    let (status, body) = t.send("GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_id is required");

    let (status, _) = t
        .send("GET", &format!("/orders/{order_id}?user_id=user-2"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.send("GET", "/orders/order-missing?user_id=user-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("order-missing"));

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_order_is_rejected() {
    let t = setup();
    let (status, body) = t
        .send(
            "POST",
            "/orders",
            Some(json!({
                "user_id": "user-1",
                "items": [],
                "shipping_address": "1 Main St",
                "currency": "USD"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    t.platform.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_placed_order_is_confirmed_and_paid() {
    let t = setup();
    let created = t.create_order("user-1", 1).await;
    let order_id = created["id"].as_str().unwrap();

    t.wait_for_status(order_id, "user-1", "CONFIRMED").await;

    let payment = t
        .platform
        .payments()
        .find_by_order(&OrderId::new(order_id))
        .unwrap();
    let (status, body) = t.send("GET", &format!("/payments/{}", payment.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["order_id"], order_id);

    let (status, body) = t
        .send("POST", &format!("/payments/{}/refund", payment.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REFUNDED");

    let (status, _) = t
        .send("POST", &format!("/payments/{}/refund", payment.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t.send("GET", "/payments/pay-missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_list_user_orders() {
    let t = setup();
    t.create_order("user-1", 1).await;
    t.create_order("user-1", 1).await;
    t.create_order("user-2", 1).await;

    let (status, body) = t.send("GET", "/users/user-1/orders?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 10);
    let numbers: Vec<i64> = body["orders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![2, 1]);

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_order_twice_conflicts() {
    let t = setup();
    let created = t.create_order("user-1", 1).await;
    let order_id = created["id"].as_str().unwrap();
    let uri = format!("/orders/{order_id}/cancel");

    let (status, body) = t.send("POST", &uri, Some(json!({ "user_id": "user-1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = t.send("POST", &uri, Some(json!({ "user_id": "user-1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Order already cancelled");

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_edit_order_items() {
    let t = setup();
    let created = t.create_order("user-1", 1).await;
    let order_id = created["id"].as_str().unwrap();

    let (status, body) = t
        .send(
            "POST",
            &format!("/orders/{order_id}/items"),
            Some(json!({
                "user_id": "user-1",
                "product_id": "prod-3",
                "product_name": "Coffee Mug",
                "quantity": 2,
                "price": 1599
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_amount"], 9999 + 2 * 1599);

    let (status, body) = t
        .send(
            "DELETE",
            &format!("/orders/{order_id}/items/prod-3?user_id=user-1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_amount"], 9999);

    let (status, _) = t
        .send(
            "DELETE",
            &format!("/orders/{order_id}/items/prod-9?user_id=user-1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_catalog_reads() {
    let t = setup();

    let (status, body) = t.send("GET", "/products?category_id=cat-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);

    let (status, body) = t.send("GET", "/products?search=mug", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"][0]["id"], "prod-3");

    let (status, body) = t.send("GET", "/products/prod-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Wireless Headphones");
    assert_eq!(body["stock_quantity"], 3);

    let (status, _) = t.send("GET", "/products/prod-404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t.send("GET", "/categories?active_only=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    t.platform.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stock_check() {
    let t = setup();
    let (status, body) = t
        .send(
            "POST",
            "/stock/check",
            Some(json!({
                "items": [
                    { "product_id": "prod-1", "quantity": 2 },
                    { "product_id": "prod-2", "quantity": 5 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_available"], false);
    assert_eq!(body["results"][0]["is_available"], true);
    assert_eq!(body["results"][1]["available_quantity"], 1);

    let (status, _) = t.send("POST", "/stock/check", Some(json!({ "items": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    t.platform.shutdown().await.unwrap();
}
