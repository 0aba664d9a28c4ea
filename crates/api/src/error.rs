//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use orders::OrderError;
use payments::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    Order(OrderError),
    Inventory(InventoryError),
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => (order_status(&err), err.to_string()),
            ApiError::Inventory(err) => (inventory_status(&err), err.to_string()),
            ApiError::Payment(err) => (payment_status(&err), err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::NotFound(_) | OrderError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::AccessDenied => StatusCode::FORBIDDEN,
        OrderError::InvalidStatusTransition { .. }
        | OrderError::CannotCancelDelivered
        | OrderError::AlreadyCancelled
        | OrderError::OrderCancelled
        | OrderError::AlreadyExists(_) => StatusCode::CONFLICT,
        err if err.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        InventoryError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        InventoryError::InsufficientStock { .. }
        | InventoryError::InsufficientReserved { .. }
        | InventoryError::DuplicateReservation(_)
        | InventoryError::Multiple(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::InvalidRefund { .. } | PaymentError::Declined(_) => StatusCode::CONFLICT,
        PaymentError::Processor(_) | PaymentError::Timeout(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}
