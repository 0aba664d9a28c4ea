//! Payment lookup and refund endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::PaymentId;
use payments::Payment;

use super::AppState;
use crate::error::ApiError;

/// GET /payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.payments.get_payment(&PaymentId::new(id))?))
}

/// POST /payments/{id}/refund: only completed payments can be refunded.
#[tracing::instrument(skip(state))]
pub async fn refund(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.payments.refund_payment(&PaymentId::new(id))?))
}
