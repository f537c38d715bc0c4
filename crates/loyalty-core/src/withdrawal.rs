//! Withdrawal ledger entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{UserId, WithdrawalId};

/// A point debit against a future order. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Ledger identifier.
    pub id: WithdrawalId,

    /// User whose balance was debited.
    pub user_id: UserId,

    /// Order number the points were spent on.
    pub order: String,

    /// Points debited, always positive.
    pub sum: Decimal,

    /// When the debit was applied.
    pub processed_at: DateTime<Utc>,
}

impl Withdrawal {
    /// A withdrawal stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, order: impl Into<String>, sum: Decimal) -> Self {
        Self {
            id: WithdrawalId::generate(),
            user_id,
            order: order.into(),
            sum,
            processed_at: Utc::now(),
        }
    }
}
