//! Version tokens for optimistic concurrency.
//!
//! Every mutable aggregate carries an integer `version`. Writers send the
//! version they read; the store compares it with the stored value and
//! either bumps it or refuses the write. There are no in-process locks:
//! several service instances may run against the same store.

use crate::error::BillingError;

/// Version assigned to an aggregate on first insert.
pub const INITIAL_VERSION: i64 = 1;

/// An aggregate guarded by a version token.
pub trait Versioned {
    /// Entity name used in conflict and not-found errors.
    const ENTITY: &'static str;

    /// Stable identifier rendered for error messages and store keys.
    fn entity_id(&self) -> String;

    /// The version this copy was read at.
    fn version(&self) -> i64;

    /// Overwrites the version. Only the store calls this.
    fn set_version(&mut self, version: i64);
}

/// Compare-and-swap check performed by every store `update`.
///
/// # Errors
///
/// Returns `BillingError::ConcurrencyConflict` when `expected` no longer
/// matches the stored version.
pub fn check_version<T: Versioned>(stored: &T, expected: i64) -> Result<(), BillingError> {
    let actual = stored.version();
    if actual == expected {
        Ok(())
    } else {
        Err(BillingError::ConcurrencyConflict {
            entity: T::ENTITY,
            id: stored.entity_id(),
            expected,
            actual,
        })
    }
}
