//! Accrual client error types.

use loyalty_core::OrderStatus;

/// Errors that can occur when querying the accrual service.
///
/// All of these are transient from the reconciler's point of view: the order
/// stays where it is and is polled again on the next pass.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service reported an internal failure.
    #[error("accrual service failure: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The service answered with a status outside its protocol.
    #[error("unexpected accrual response: HTTP {status}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
    },

    /// A decision carrying a status the service may not report.
    #[error("accrual service reported status {status} for order {order}")]
    UnexpectedDecision {
        /// Order number from the decision.
        order: String,
        /// Reported status.
        status: OrderStatus,
    },

    /// A 200 body that is not a valid decision.
    #[error("malformed accrual response: {0}")]
    Decode(#[from] serde_json::Error),
}
