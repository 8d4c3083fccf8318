//! Application-wide error types.
//!
//! Domain crates keep their own error enums and fold into `AppError` at the
//! boundary where a thin adapter (HTTP, scheduler, CLI) needs one shape.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation, no partial state written.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Optimistic concurrency conflict. The caller must re-read and retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage or other infrastructure fault that survived retries.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::BusinessRule(_) => 422,
            Self::Infrastructure(_) => 503,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request unchanged
    /// after re-reading state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Infrastructure(_))
    }
}
