//! Error types for the loyalty domain.

use crate::ids::IdError;
use crate::order::OrderNumberError;

/// Result type for loyalty domain operations.
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Errors raised by domain validation.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    /// Order number failed validation.
    #[error("invalid order number: {0}")]
    InvalidOrderNumber(#[from] OrderNumberError),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Unknown order status string.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}
