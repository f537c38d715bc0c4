//! Orders and the order status state machine.
//!
//! ```text
//! NEW -> REGISTERED -> PROCESSING -> PROCESSED
//!   \________\_____________\------> INVALID
//! ```
//!
//! `PROCESSED` and `INVALID` are terminal. Withdrawal-settling orders are
//! created directly in `PROCESSED`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LoyaltyError;
use crate::{OrderId, UserId};

// ============================================================================
// Order Number
// ============================================================================

/// Checks a string of ASCII digits against the Luhn checksum.
///
/// Every second digit counting from the rightmost one (exclusive) is doubled,
/// with 9 subtracted when the product exceeds 9. The total must be divisible
/// by 10. Empty strings and strings containing anything other than ASCII
/// digits are rejected.
#[must_use]
pub fn is_valid_luhn(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    for (position, ch) in number.chars().rev().enumerate() {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

/// A purchase order number that passed the Luhn check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Validate and wrap an order number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains a non-digit, or fails
    /// the Luhn checksum.
    pub fn parse(raw: &str) -> Result<Self, OrderNumberError> {
        if raw.is_empty() {
            return Err(OrderNumberError::Empty);
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::NonDigit);
        }
        if !is_valid_luhn(raw) {
            return Err(OrderNumberError::Checksum);
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

/// Why an order number was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrderNumberError {
    /// No digits at all.
    #[error("order number is empty")]
    Empty,

    /// Contains something other than ASCII digits.
    #[error("order number must contain only digits")]
    NonDigit,

    /// Digits do not satisfy the Luhn checksum.
    #[error("order number fails the checksum")]
    Checksum,
}

// ============================================================================
// Order Status
// ============================================================================

/// Where an order sits in the accrual pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Uploaded, not yet seen by the accrual service.
    New,
    /// Accepted by the accrual service, awaiting computation.
    Registered,
    /// The accrual service is computing.
    Processing,
    /// Accrual computed and fixed.
    Processed,
    /// Rejected by the accrual service.
    Invalid,
}

impl OrderStatus {
    /// Statuses the reconciler polls.
    pub const WAITING: [Self; 3] = [Self::New, Self::Registered, Self::Processing];

    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Invalid => "INVALID",
        }
    }

    /// Whether the order will never be polled again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LoyaltyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            "INVALID" => Ok(Self::Invalid),
            other => Err(LoyaltyError::UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Order
// ============================================================================

/// An order owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Row identifier.
    pub id: OrderId,

    /// Order number, unique across all users.
    ///
    /// Intake orders carry a Luhn-checked number; withdrawal-settling orders
    /// carry the withdrawal reference as given.
    pub number: String,

    /// Owning user.
    pub user_id: UserId,

    /// Current status.
    pub status: OrderStatus,

    /// Points accrued so far.
    pub accrual: Decimal,

    /// When the order was uploaded.
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// A freshly uploaded order in `NEW`.
    #[must_use]
    pub fn new(number: OrderNumber, user_id: UserId) -> Self {
        Self {
            id: OrderId::generate(),
            number: number.into_inner(),
            user_id,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    /// An order that settles a withdrawal; it never enters reconciliation.
    #[must_use]
    pub fn settled(reference: impl Into<String>, user_id: UserId) -> Self {
        Self {
            id: OrderId::generate(),
            number: reference.into(),
            user_id,
            status: OrderStatus::Processed,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    /// Whether the reconciler should poll this order.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_known_good_numbers() {
        assert!(is_valid_luhn("3182649"));
        assert!(is_valid_luhn("79927398713"));
        assert!(is_valid_luhn("0"));
        assert!(is_valid_luhn("12345678903"));
    }

    #[test]
    fn luhn_rejects_bad_numbers() {
        assert!(!is_valid_luhn("11111111"));
        assert!(!is_valid_luhn("79927398710"));
        assert!(!is_valid_luhn("3182648"));
    }

    #[test]
    fn luhn_rejects_non_digits_and_empty() {
        assert!(!is_valid_luhn(""));
        assert!(!is_valid_luhn("31826a9"));
        assert!(!is_valid_luhn("3182 649"));
        assert!(!is_valid_luhn("-3182649"));
    }

    #[test]
    fn order_number_parse_errors() {
        assert_eq!(OrderNumber::parse(""), Err(OrderNumberError::Empty));
        assert_eq!(OrderNumber::parse("12a"), Err(OrderNumberError::NonDigit));
        assert_eq!(
            OrderNumber::parse("11111111"),
            Err(OrderNumberError::Checksum)
        );
        assert_eq!(OrderNumber::parse("3182649").unwrap().as_str(), "3182649");
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"REGISTERED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Registered);
        assert!("DONE".parse::<OrderStatus>().is_err());
        for status in OrderStatus::WAITING {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Processed.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::WAITING.iter().all(|s| !s.is_terminal()));
    }

    #[test]
    fn new_and_settled_orders() {
        let user = UserId::generate();
        let order = Order::new(OrderNumber::parse("3182649").unwrap(), user);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.accrual, Decimal::ZERO);
        assert!(order.is_waiting());

        let settled = Order::settled("W1", user);
        assert_eq!(settled.status, OrderStatus::Processed);
        assert!(!settled.is_waiting());
    }
}
