//! Fixed-point rounding rules for billing amounts.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every helper here works on `rust_decimal::Decimal`.
//!
//! Billing rounds half-up (midpoint away from zero), not banker's rounding:
//! tenants are invoiced the amount a calculator would show them.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits carried by every monetary field.
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits carried by meter quantities.
pub const QUANTITY_SCALE: u32 = 3;

/// Fractional digits carried by percentages (tax rate, ownership share).
pub const PERCENT_SCALE: u32 = 2;

/// Rounds a monetary amount to two decimals, half-up.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a meter quantity to three decimals, half-up.
#[must_use]
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a percentage to two decimals, half-up.
#[must_use]
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax on `amount` at `rate_percent` (e.g. `18.00` for 18%), rounded to money precision.
#[must_use]
pub fn tax_on(amount: Decimal, rate_percent: Decimal) -> Decimal {
    if rate_percent.is_zero() {
        return Decimal::ZERO;
    }
    round_money(amount * rate_percent / Decimal::ONE_HUNDRED)
}
