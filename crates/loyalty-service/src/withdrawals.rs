//! Withdrawal service.

use std::sync::Arc;

use rust_decimal::Decimal;

use loyalty_core::{fits_points_scale, UserId, Withdrawal, POINTS_SCALE};
use loyalty_store::{Store, StoreError};

/// Why a withdrawal was refused.
#[derive(Debug, thiserror::Error)]
pub enum WithdrawalError {
    /// The request itself is unusable.
    #[error("invalid withdrawal: {0}")]
    Invalid(String),

    /// Storage refused or failed the debit.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Debits points against a withdrawal reference.
#[derive(Clone)]
pub struct WithdrawalService {
    store: Arc<dyn Store>,
}

impl WithdrawalService {
    /// Create a withdrawal service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Withdraw `sum` points from `user_id` against `reference`.
    ///
    /// The debit, the ledger entry and the settling order are written
    /// atomically. Returns the recorded withdrawal and the new balance.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        reference: &str,
        sum: Decimal,
    ) -> Result<(Withdrawal, Decimal), WithdrawalError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(WithdrawalError::Invalid("order is required".into()));
        }
        if sum <= Decimal::ZERO {
            return Err(WithdrawalError::Invalid("sum must be positive".into()));
        }
        if !fits_points_scale(sum) {
            return Err(WithdrawalError::Invalid(format!(
                "sum must have at most {POINTS_SCALE} decimal places"
            )));
        }

        let withdrawal = Withdrawal::new(user_id, reference, sum);
        match self.store.withdraw(&withdrawal).await {
            Ok(balance) => {
                tracing::info!(
                    user_id = %user_id,
                    order = %withdrawal.order,
                    sum = %sum,
                    balance = %balance,
                    "Points withdrawn"
                );
                Ok((withdrawal, balance))
            }
            Err(e @ StoreError::InsufficientFunds { .. }) => {
                tracing::info!(user_id = %user_id, sum = %sum, "Withdrawal refused: {e}");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for WithdrawalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawalService").finish_non_exhaustive()
    }
}
