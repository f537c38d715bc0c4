//! Point amount precision.
//!
//! Balances, accruals and withdrawals are kept with two decimal places in
//! every backend. Amounts coming from outside are either rounded to that
//! scale (accrual decisions) or refused when they do not fit (withdrawals).

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places a point amount is stored with.
pub const POINTS_SCALE: u32 = 2;

/// Round `amount` to the stored precision, half away from zero.
#[must_use]
pub fn round_points(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(POINTS_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether `amount` can be stored without rounding.
#[must_use]
pub fn fits_points_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= POINTS_SCALE
}
