//! Billing error taxonomy.
//!
//! Each module owns a `thiserror` enum. `BillingError` wraps them all plus
//! the cross-cutting conflict, not-found and infrastructure cases, and maps
//! every error onto one `ErrorKind`.

use thiserror::Error;

use leasebill_shared::AppError;

use crate::invoice::InvoiceError;
use crate::invoice_run::InvoiceRunError;
use crate::payment::PaymentError;
use crate::period::PeriodError;
use crate::proration::ProrationError;
use crate::rating::RatingError;
use crate::statement::StatementError;

/// Result type alias using `BillingError`.
pub type BillingResult<T> = Result<T, BillingError>;

/// Error categories shared by every billing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, rejected before any mutation.
    Validation,
    /// A business rule refused the operation; nothing was written.
    BusinessRule,
    /// Version mismatch or duplicate; re-read and retry.
    Conflict,
    /// Referenced entity missing (or soft-deleted).
    NotFound,
    /// Storage fault.
    Infrastructure,
}

impl ErrorKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::BusinessRule => "business_rule",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::BusinessRule => 422,
            Self::Infrastructure => 503,
        }
    }
}

/// Errors that can occur during any billing operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    // ========== Module Errors ==========
    /// Rate plan resolution or slab pricing failed.
    #[error(transparent)]
    Rating(#[from] RatingError),

    /// Proration failed.
    #[error(transparent)]
    Proration(#[from] ProrationError),

    /// Period arithmetic failed.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Statement operation failed.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// Invoice operation failed.
    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    /// Invoice run operation failed.
    #[error(transparent)]
    InvoiceRun(#[from] InvoiceRunError),

    /// Payment or credit note operation failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    // ========== Store Errors ==========
    /// The stored version moved on since the caller read the entity.
    #[error("Concurrent modification of {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Entity name.
        entity: &'static str,
        /// Entity id.
        id: String,
        /// Version the caller read.
        expected: i64,
        /// Version in the store.
        actual: i64,
    },

    /// A unique key is already taken.
    #[error("{entity} {key} already exists")]
    Duplicate {
        /// Entity name.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// Entity missing or soft-deleted.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Entity id.
        id: String,
    },

    /// Storage fault that survived the retry policy.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// The store refused a write that would break a stored invariant.
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

impl BillingError {
    /// Shorthand for `NotFound`.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rating(e) => e.kind(),
            Self::Proration(e) => e.kind(),
            Self::Period(e) => e.kind(),
            Self::Statement(e) => e.kind(),
            Self::Invoice(e) => e.kind(),
            Self::InvoiceRun(e) => e.kind(),
            Self::Payment(e) => e.kind(),
            Self::ConcurrencyConflict { .. } | Self::Duplicate { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Infrastructure(_) | Self::Integrity(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rating(e) => e.error_code(),
            Self::Proration(e) => e.error_code(),
            Self::Period(e) => e.error_code(),
            Self::Statement(e) => e.error_code(),
            Self::Invoice(e) => e.error_code(),
            Self::InvoiceRun(e) => e.error_code(),
            Self::Payment(e) => e.error_code(),
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
            Self::Integrity(_) => "INTEGRITY_VIOLATION",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns true if re-running the whole unit of work may succeed.
    ///
    /// Version conflicts, unique-key races and storage faults qualify; a
    /// re-run re-reads state and either succeeds or fails deterministically.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Duplicate { .. } | Self::Infrastructure(_)
        )
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::BusinessRule => Self::BusinessRule(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Infrastructure => Self::Infrastructure(message),
        }
    }
}
