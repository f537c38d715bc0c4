//! Registration and login handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use loyalty_core::User;

use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;

/// Credentials for registration and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    /// Login.
    #[serde(default)]
    pub login: String,
    /// Plain-text password.
    #[serde(default)]
    pub password: String,
}

/// Session response body.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// User ID.
    pub user_id: String,
    /// Login.
    pub login: String,
}

fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<CredentialsRequest, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if body.login.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("login and password are required".into()));
    }

    Ok(body)
}

/// Respond with a fresh session for `user`.
fn start_session(state: &AppState, user: &User) -> Result<Response, ApiError> {
    let token = state.sessions.issue(&user.id)?;

    Ok((
        [
            (SET_COOKIE, state.sessions.cookie(&token)),
            (AUTHORIZATION, format!("Bearer {token}")),
        ],
        Json(SessionResponse {
            user_id: user.id.to_string(),
            login: user.login.clone(),
        }),
    )
        .into_response())
}

/// Register a new user and log them in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = credentials(payload)?;
    let login = body.login.trim();

    if state.store.get_user_by_login(login).await?.is_some() {
        return Err(ApiError::Conflict(format!("Login {login} is already taken")));
    }

    let user = User::new(login, hash_password(&body.password).await?);
    state.store.create_user(&user).await?;

    tracing::info!(user_id = %user.id, login = %user.login, "User registered");

    start_session(&state, &user)
}

/// Log in with existing credentials.
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = credentials(payload)?;

    let user = match state.store.get_user_by_login(body.login.trim()).await? {
        Some(user) if verify_password(&body.password, &user.password_hash).await? => user,
        _ => {
            tracing::debug!(login = %body.login, "Login failed");
            return Err(ApiError::Unauthorized);
        }
    };

    tracing::info!(user_id = %user.id, "User logged in");

    start_session(&state, &user)
}
