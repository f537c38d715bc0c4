//! Order intake and listing handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use loyalty_core::{Order, OrderStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::intake::IntakeOutcome;
use crate::state::AppState;

/// Order response.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Order number.
    pub number: String,
    /// Current status.
    pub status: OrderStatus,
    /// Points accrued; omitted while zero.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    /// Upload timestamp (RFC 3339).
    pub uploaded_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.clone(),
            status: order.status,
            accrual: (!order.accrual.is_zero()).then_some(order.accrual),
            uploaded_at: order.uploaded_at.to_rfc3339(),
        }
    }
}

/// Submit an order number (plain-text body).
///
/// `202` for a new order, `200` when the caller already submitted it.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    match state.intake.submit(auth.user_id, &body).await? {
        IntakeOutcome::Accepted(_) => Ok(StatusCode::ACCEPTED),
        IntakeOutcome::AlreadyOwned(_) => Ok(StatusCode::OK),
    }
}

/// List the caller's orders, oldest first. `204` when there are none.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let orders = state.store.list_orders_by_user(&auth.user_id).await?;

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
