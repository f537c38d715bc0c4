//! Core types for the loyalty points service.
//!
//! This crate provides the domain vocabulary shared by every other crate:
//!
//! - **Identifiers**: `UserId`, `OrderId`, `WithdrawalId`
//! - **Orders**: `OrderNumber` (Luhn-checked), `OrderStatus`, `Order`
//! - **Users**: `User`, `Balance`
//! - **Withdrawals**: `Withdrawal`
//!
//! # Points
//!
//! Points are decimal amounts (`rust_decimal::Decimal`). A user's balance only
//! moves through two paths: an accrual credit applied by the reconciler, or a
//! withdrawal debit. Both are transactional in the store layer, and amounts
//! carry at most [`POINTS_SCALE`] decimal places.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod order;
pub mod points;
pub mod user;
pub mod withdrawal;

pub use error::{LoyaltyError, Result};
pub use ids::{IdError, OrderId, UserId, WithdrawalId};
pub use order::{is_valid_luhn, Order, OrderNumber, OrderNumberError, OrderStatus};
pub use points::{fits_points_scale, round_points, POINTS_SCALE};
pub use rust_decimal::Decimal;
pub use user::{Balance, User};
pub use withdrawal::Withdrawal;
