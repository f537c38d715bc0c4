//! Loyalty points HTTP API service.
//!
//! This crate provides:
//!
//! - User registration and login with session tokens
//! - Order intake and listing
//! - Balance queries, withdrawals and withdrawal history
//! - The accrual reconciler, a background task that settles orders against
//!   the external accrual service
//!
//! # Authentication
//!
//! Login and registration issue an HS256 session token. It is delivered as the
//! `session_token` cookie and as an `Authorization: Bearer` header; protected
//! endpoints accept either.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health handler needs async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod withdrawals;

pub use config::{CliArgs, ServiceConfig};
pub use error::ApiError;
pub use intake::{IntakeError, IntakeOutcome, OrderIntake};
pub use reconciler::{PassOutcome, Reconciler, ReconcilerConfig, DEFAULT_POLL_INTERVAL};
pub use routes::create_router;
pub use state::AppState;
pub use withdrawals::{WithdrawalError, WithdrawalService};
