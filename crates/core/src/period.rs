//! Billing period arithmetic.
//!
//! A billing period is an inclusive date range. Monthly periods are anchored
//! on a lease's billing day (1-28, so every month has that day).

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::ErrorKind;

/// Highest billing day a lease may use.
pub const MAX_BILLING_DAY: u32 = 28;

/// Errors raised while constructing billing periods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    /// Start date is after end date.
    #[error("Invalid period: start {start} is after end {end}")]
    Inverted {
        /// Period start.
        start: NaiveDate,
        /// Period end.
        end: NaiveDate,
    },

    /// Billing day outside 1..=28.
    #[error("Billing day must be between 1 and {MAX_BILLING_DAY}, got {0}")]
    InvalidBillingDay(u32),

    /// Date arithmetic left chrono's supported range.
    #[error("Date out of supported range")]
    OutOfRange,
}

impl PeriodError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Inverted { .. } | Self::OutOfRange => "INVALID_PERIOD",
            Self::InvalidBillingDay(_) => "INVALID_BILLING_DAY",
        }
    }
}

/// An inclusive date range an invoice or utility statement covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// First day of the period.
    pub start: NaiveDate,
    /// Last day of the period (inclusive).
    pub end: NaiveDate,
}

impl BillingPeriod {
    /// Creates a period, rejecting inverted ranges.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days in the period, both ends included.
    #[must_use]
    pub fn days(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if the open-ended window `[start, end]` shares at least one day with this period.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: Option<NaiveDate>) -> bool {
        start <= self.end && end.is_none_or(|e| e >= self.start)
    }

    /// The part of this period covered by the open-ended window `[start, end]`.
    #[must_use]
    pub fn intersect(&self, start: NaiveDate, end: Option<NaiveDate>) -> Option<Self> {
        let from = start.max(self.start);
        let to = end.map_or(self.end, |e| e.min(self.end));
        (from <= to).then_some(Self {
            start: from,
            end: to,
        })
    }

    /// The calendar month containing `date`.
    pub fn calendar_month(date: NaiveDate) -> Result<Self, PeriodError> {
        let start = date.with_day(1).ok_or(PeriodError::OutOfRange)?;
        Self::monthly_from(start)
    }

    /// One month starting on `start`: `[start, start + 1 month - 1 day]`.
    pub fn monthly_from(start: NaiveDate) -> Result<Self, PeriodError> {
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or(PeriodError::OutOfRange)?;
        Ok(Self { start, end })
    }

    /// The monthly period for `billing_day` that contains `reference`.
    pub fn containing(billing_day: u32, reference: NaiveDate) -> Result<Self, PeriodError> {
        validate_billing_day(billing_day)?;
        let candidate = reference
            .with_day(billing_day)
            .ok_or(PeriodError::OutOfRange)?;
        let start = if candidate <= reference {
            candidate
        } else {
            candidate
                .checked_sub_months(Months::new(1))
                .ok_or(PeriodError::OutOfRange)?
        };
        Self::monthly_from(start)
    }

    /// The first monthly period for `billing_day` starting on or after `from`.
    pub fn first_on_or_after(billing_day: u32, from: NaiveDate) -> Result<Self, PeriodError> {
        validate_billing_day(billing_day)?;
        let candidate = from.with_day(billing_day).ok_or(PeriodError::OutOfRange)?;
        let start = if candidate >= from {
            candidate
        } else {
            candidate
                .checked_add_months(Months::new(1))
                .ok_or(PeriodError::OutOfRange)?
        };
        Self::monthly_from(start)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Validates a lease billing day.
pub fn validate_billing_day(billing_day: u32) -> Result<(), PeriodError> {
    if (1..=MAX_BILLING_DAY).contains(&billing_day) {
        Ok(())
    } else {
        Err(PeriodError::InvalidBillingDay(billing_day))
    }
}

/// Whole calendar months from `from`'s month to `to`'s month (negative when `to` is earlier).
#[must_use]
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month().cast_signed() - from.month().cast_signed()
}
