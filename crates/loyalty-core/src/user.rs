//! Users and their point balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,

    /// Login, unique across users.
    pub login: String,

    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Current point balance.
    ///
    /// Changed only by an accrual credit or a withdrawal debit.
    pub balance: Decimal,

    /// When the user registered.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A new user with a zero balance.
    #[must_use]
    pub fn new(login: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            login: login.into(),
            password_hash: password_hash.into(),
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Whether the balance covers `amount`.
    #[must_use]
    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Current balance and total withdrawn for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Points available now.
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    /// Points withdrawn over the user's lifetime.
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}
