//! Liveness and dependency report.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the store does not answer.
    pub status: &'static str,
    /// Storage backend in use.
    pub store: &'static str,
    /// Whether orders are being reconciled against an accrual service.
    pub reconciling: bool,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health`. Answers 503 while the store is unreachable.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(store = state.store.backend(), error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            store: state.store.backend(),
            reconciling: state.config.accrual_address.is_some(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
