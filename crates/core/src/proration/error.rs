//! Proration error types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while prorating an amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProrationError {
    /// A date range has its start after its end.
    #[error("Invalid period: start {start} is after end {end}")]
    InvalidPeriod {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },

    /// Occupied range is not inside the billing period.
    #[error("Occupied range {start}..{end} lies outside the billing period")]
    OutsidePeriod {
        /// Occupied start.
        start: NaiveDate,
        /// Occupied end.
        end: NaiveDate,
    },

    /// More occupied days than period days.
    #[error("Occupied days {occupied} exceed period days {period}")]
    OccupiedExceedsPeriod {
        /// Occupied days.
        occupied: u32,
        /// Period days.
        period: u32,
    },

    /// The period has no days.
    #[error("Billing period has zero days")]
    EmptyPeriod,

    /// The full-period amount is negative.
    #[error("Amount to prorate cannot be negative: {0}")]
    NegativeAmount(Decimal),
}

impl ProrationError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriod { .. }
            | Self::OutsidePeriod { .. }
            | Self::OccupiedExceedsPeriod { .. }
            | Self::EmptyPeriod => "INVALID_PERIOD",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
        }
    }
}
