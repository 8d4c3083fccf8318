//! Proration arithmetic.
//!
//! `amount × occupied_days / period_days`, rounded half-up to money
//! precision. Full coverage returns the amount untouched so no rounding
//! drift creeps into whole-period charges.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use leasebill_shared::types::round_money;

use super::error::ProrationError;

/// Day count used by `ProrationMethod::FixedThirtyDayMonth`.
pub const FIXED_MONTH_DAYS: u32 = 30;

/// How a lease's partial periods are measured.
///
/// One method is configured per lease and applied to every recurring
/// charge on that lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProrationMethod {
    /// Denominator is the actual number of days in the billing period.
    #[default]
    ActualDaysInMonth,
    /// Denominator is 30; occupied days are `30 - unoccupied days`.
    FixedThirtyDayMonth,
}

/// Result of prorating one amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proration {
    /// Prorated amount.
    pub amount: Decimal,
    /// Numerator used.
    pub occupied_days: u32,
    /// Denominator used.
    pub period_days: u32,
}

impl Proration {
    /// Returns true if the whole period was covered.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupied_days == self.period_days
    }
}

/// Stateless proration service.
pub struct ProrationCalculator;

impl ProrationCalculator {
    /// Prorate `amount` for the occupied part of a billing period.
    ///
    /// # Arguments
    ///
    /// * `amount` - Full-period amount (non-negative)
    /// * `period_start`, `period_end` - Billing period, inclusive
    /// * `occupied_start`, `occupied_end` - Part of the period the lease covers, inclusive
    /// * `method` - The lease's proration method
    ///
    /// # Errors
    ///
    /// `InvalidPeriod` for inverted ranges, `OutsidePeriod` when the occupied
    /// range leaves the period, `NegativeAmount` for negative input.
    pub fn prorate(
        amount: Decimal,
        period_start: NaiveDate,
        period_end: NaiveDate,
        occupied_start: NaiveDate,
        occupied_end: NaiveDate,
        method: ProrationMethod,
    ) -> Result<Proration, ProrationError> {
        let period_days = inclusive_days(period_start, period_end)?;
        let occupied_days = inclusive_days(occupied_start, occupied_end)?;

        if occupied_start < period_start || occupied_end > period_end {
            return Err(ProrationError::OutsidePeriod {
                start: occupied_start,
                end: occupied_end,
            });
        }

        let (occupied_days, period_days) = match method {
            ProrationMethod::ActualDaysInMonth => (occupied_days, period_days),
            ProrationMethod::FixedThirtyDayMonth => {
                let unoccupied = period_days - occupied_days;
                (
                    FIXED_MONTH_DAYS.saturating_sub(unoccupied),
                    FIXED_MONTH_DAYS,
                )
            }
        };

        let prorated = Self::prorate_days(amount, occupied_days, period_days)?;

        Ok(Proration {
            amount: prorated,
            occupied_days,
            period_days,
        })
    }

    /// Prorate by raw day counts.
    ///
    /// # Errors
    ///
    /// `EmptyPeriod` when `period_days` is zero, `OccupiedExceedsPeriod` when
    /// `occupied_days > period_days`, `NegativeAmount` for negative input.
    pub fn prorate_days(
        amount: Decimal,
        occupied_days: u32,
        period_days: u32,
    ) -> Result<Decimal, ProrationError> {
        if amount < Decimal::ZERO {
            return Err(ProrationError::NegativeAmount(amount));
        }
        if period_days == 0 {
            return Err(ProrationError::EmptyPeriod);
        }
        if occupied_days > period_days {
            return Err(ProrationError::OccupiedExceedsPeriod {
                occupied: occupied_days,
                period: period_days,
            });
        }

        if occupied_days == period_days {
            return Ok(amount);
        }
        if occupied_days == 0 {
            return Ok(Decimal::ZERO);
        }

        Ok(round_money(
            amount * Decimal::from(occupied_days) / Decimal::from(period_days),
        ))
    }
}

fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Result<u32, ProrationError> {
    if start > end {
        return Err(ProrationError::InvalidPeriod { start, end });
    }
    u32::try_from((end - start).num_days() + 1).map_err(|_| ProrationError::InvalidPeriod { start, end })
}
