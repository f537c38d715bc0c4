//! Balance, withdrawal and withdrawal history handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loyalty_core::{Balance, Withdrawal};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Withdrawal request.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Reference the withdrawal is made against.
    pub order: String,
    /// Points to withdraw.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

/// Withdrawal response.
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    /// Reference the withdrawal was made against.
    pub order: String,
    /// Points withdrawn.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    /// When it was processed (RFC 3339).
    pub processed_at: String,
}

impl From<&Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            order: withdrawal.order.clone(),
            sum: withdrawal.sum,
            processed_at: withdrawal.processed_at.to_rfc3339(),
        }
    }
}

/// Current balance and lifetime withdrawn points.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Balance>, ApiError> {
    let balance = state.store.balance(&auth.user_id).await?;
    Ok(Json(balance))
}

/// Withdraw points.
///
/// `402` when the balance does not cover the sum, `409` when the reference
/// is already an order number, `422` for an unusable request.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let (withdrawal, _) = state
        .withdrawals
        .withdraw(auth.user_id, &body.order, body.sum)
        .await?;

    Ok(Json(WithdrawalResponse::from(&withdrawal)))
}

/// List the caller's withdrawals, oldest first. `204` when there are none.
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let withdrawals = state.store.list_withdrawals_by_user(&auth.user_id).await?;

    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals.iter().map(WithdrawalResponse::from).collect();
    Ok(Json(body).into_response())
}
