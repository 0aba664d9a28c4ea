//! HTTP gateway for the fulfillment services.
//!
//! A thin adapter over the synchronous service calls: order placement and
//! queries, catalog reads, stock checks and payment lookups. Everything that
//! happens after an order is placed travels over the broker, not through
//! here.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/{id}/items", post(routes::orders::add_item))
        .route(
            "/orders/{id}/items/{product_id}",
            delete(routes::orders::remove_item),
        )
        .route("/users/{user_id}/orders", get(routes::orders::list_for_user))
        .route("/products", get(routes::catalog::list_products))
        .route("/products/{id}", get(routes::catalog::get_product))
        .route("/stock/check", post(routes::catalog::check_stock))
        .route("/categories", get(routes::catalog::list_categories))
        .route("/payments/{id}", get(routes::payments::get))
        .route("/payments/{id}/refund", post(routes::payments::refund))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
