//! Statement error types.

use rust_decimal::Decimal;
use thiserror::Error;

use leasebill_shared::types::StatementId;

use crate::error::ErrorKind;
use crate::rating::RatingError;

/// Errors that can occur while editing or finalizing a utility statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    /// Statement is finalized and can no longer change.
    #[error("Statement {0} is finalized and cannot be modified")]
    NotEditable(StatementId),

    /// Statement is referenced by a live invoice line.
    #[error("Statement {0} is billed on an invoice and is locked")]
    Locked(StatementId),

    /// Current reading is below the previous one.
    #[error("Current reading {current} is below previous reading {previous}")]
    ReadingDecreased {
        /// Previous meter reading.
        previous: Decimal,
        /// Current meter reading.
        current: Decimal,
    },

    /// A meter reading is negative.
    #[error("Meter readings cannot be negative: {0}")]
    NegativeReading(Decimal),

    /// Direct bill amount is negative.
    #[error("Direct bill amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    /// Finalize called before readings or an amount were entered.
    #[error("Statement {0} has neither readings nor a direct amount")]
    MissingInput(StatementId),

    /// Finalize called with the wrong mode for the entered input.
    #[error("Statement {id} is not a {expected} statement")]
    InputMismatch {
        /// Statement id.
        id: StatementId,
        /// Mode the caller asked for.
        expected: &'static str,
    },

    /// Pricing the consumption failed.
    #[error(transparent)]
    Pricing(#[from] RatingError),
}

impl StatementError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadingDecreased { .. } | Self::NegativeReading(_) | Self::NegativeAmount(_) => {
                ErrorKind::Validation
            }
            Self::NotEditable(_)
            | Self::Locked(_)
            | Self::MissingInput(_)
            | Self::InputMismatch { .. } => ErrorKind::BusinessRule,
            Self::Pricing(e) => e.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotEditable(_) => "STATEMENT_NOT_EDITABLE",
            Self::Locked(_) => "STATEMENT_LOCKED",
            Self::ReadingDecreased { .. } | Self::NegativeReading(_) => "INVALID_READING",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::MissingInput(_) => "STATEMENT_INCOMPLETE",
            Self::InputMismatch { .. } => "STATEMENT_INPUT_MISMATCH",
            Self::Pricing(e) => e.error_code(),
        }
    }
}
