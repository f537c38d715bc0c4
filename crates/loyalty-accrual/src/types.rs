//! Accrual protocol types.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use loyalty_core::OrderStatus;

/// The service's verdict on one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualDecision {
    /// Order number the decision is about.
    pub order: String,
    /// Status to set on the order verbatim. `NEW` is never a valid answer;
    /// the client rejects it.
    pub status: OrderStatus,
    /// Points earned; absent or `null` means zero.
    #[serde(
        default,
        serialize_with = "rust_decimal::serde::float::serialize",
        deserialize_with = "zero_if_null"
    )]
    pub accrual: Decimal,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let accrual = rust_decimal::serde::float_option::deserialize(deserializer)?;
    Ok(accrual.unwrap_or_default())
}

/// Classified answer to a single accrual lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualReply {
    /// The service has a decision for the order.
    Decision(AccrualDecision),
    /// The service has no record of the order yet.
    Unknown,
    /// The service is rate limiting us. No other order may be polled until
    /// `retry_after` has elapsed; `None` means the header was missing or
    /// unreadable.
    Overloaded {
        /// Wait requested through `Retry-After`.
        retry_after: Option<Duration>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn null_accrual_is_zero() {
        let decision: AccrualDecision =
            serde_json::from_str(r#"{"order":"3182649","status":"PROCESSING","accrual":null}"#)
                .unwrap();
        assert_eq!(decision.status, OrderStatus::Processing);
        assert_eq!(decision.accrual, Decimal::ZERO);
    }

    #[test]
    fn fractional_accrual_is_kept() {
        let decision: AccrualDecision =
            serde_json::from_str(r#"{"order":"3182649","status":"PROCESSED","accrual":729.98}"#)
                .unwrap();
        assert_eq!(decision.accrual, dec!(729.98));
    }
}
