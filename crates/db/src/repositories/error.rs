//! Store failures.

use leasebill_core::BillingError;

/// Result alias for repository calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a storage adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No active row with this id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Entity id.
        id: String,
    },

    /// Compare-and-swap failed.
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        /// Entity name.
        entity: &'static str,
        /// Entity id.
        id: String,
        /// Version the writer read.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// A unique key is already taken.
    #[error("{entity} with key {key} already exists")]
    Duplicate {
        /// Entity name.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// The write would rewrite data the store only appends to.
    #[error("{entity} {id}: {reason}")]
    Integrity {
        /// Entity name.
        entity: &'static str,
        /// Entity id.
        id: String,
        /// What was refused.
        reason: String,
    },

    /// The row failed domain validation and was not written.
    #[error(transparent)]
    Invalid(BillingError),

    /// Storage could not be reached or refused the operation transiently.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for faults worth retrying at the storage level.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            } => Self::ConcurrencyConflict {
                entity,
                id,
                expected,
                actual,
            },
            StoreError::Duplicate { entity, key } => Self::Duplicate { entity, key },
            err @ StoreError::Integrity { .. } => Self::Integrity(err.to_string()),
            StoreError::Invalid(err) => err,
            StoreError::Unavailable(message) => Self::Infrastructure(message),
        }
    }
}
