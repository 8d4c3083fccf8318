//! Rating error types.
//!
//! Slab contiguity problems surface when a plan is resolved, never while a
//! quantity is being priced.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use leasebill_shared::types::RatePlanId;

use super::types::UtilityType;
use crate::error::ErrorKind;

/// Errors that can occur while resolving rate plans or pricing consumption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
    // ========== Resolution Errors ==========
    /// No active plan covers the date.
    #[error("No active {utility_type} rate plan effective on {date}")]
    NoRatePlan {
        /// Utility requested.
        utility_type: UtilityType,
        /// Effective date requested.
        date: NaiveDate,
    },

    /// More than one active plan covers the date.
    #[error("{count} active {utility_type} rate plans overlap on {date}")]
    AmbiguousRatePlan {
        /// Utility requested.
        utility_type: UtilityType,
        /// Effective date requested.
        date: NaiveDate,
        /// Number of matching plans.
        count: usize,
    },

    // ========== Slab Validation Errors ==========
    /// Plan has no slabs.
    #[error("Rate plan {0} has no slabs")]
    EmptyRatePlan(RatePlanId),

    /// Two slabs share an order.
    #[error("Duplicate slab order {0}")]
    DuplicateSlabOrder(u32),

    /// A slab's upper bound is not above its lower bound.
    #[error("Slab {slab_order} has an empty or inverted range")]
    InvalidSlabRange {
        /// Offending slab.
        slab_order: u32,
    },

    /// Negative rate or fixed charge.
    #[error("Slab {slab_order} has a negative rate or fixed charge")]
    NegativeRate {
        /// Offending slab.
        slab_order: u32,
    },

    /// The first slab does not start at zero units.
    #[error("First slab must start at 0 units, starts at {0}")]
    FirstSlabNotAtZero(Decimal),

    /// A slab starts after the previous one ends.
    #[error("Gap before slab {slab_order}: expected from {expected}, found {found}")]
    SlabGap {
        /// Offending slab.
        slab_order: u32,
        /// Where the previous slab ended.
        expected: Decimal,
        /// Where this slab starts.
        found: Decimal,
    },

    /// A slab starts before the previous one ends.
    #[error("Slab {slab_order} overlaps the previous slab: expected from {expected}, found {found}")]
    SlabOverlap {
        /// Offending slab.
        slab_order: u32,
        /// Where the previous slab ended.
        expected: Decimal,
        /// Where this slab starts.
        found: Decimal,
    },

    /// An open-ended slab is followed by further slabs.
    #[error("Open-ended slab {slab_order} must be the last slab")]
    OpenSlabNotLast {
        /// Offending slab.
        slab_order: u32,
    },

    // ========== Pricing Errors ==========
    /// Consumption below zero.
    #[error("Consumption cannot be negative: {0}")]
    NegativeQuantity(Decimal),

    /// Pricing was asked for with no slabs at all.
    #[error("Cannot price consumption without slabs")]
    NoSlabs,
}

impl RatingError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRatePlan { .. } => ErrorKind::NotFound,
            Self::DuplicateSlabOrder(_)
            | Self::InvalidSlabRange { .. }
            | Self::NegativeRate { .. }
            | Self::NegativeQuantity(_) => ErrorKind::Validation,
            Self::AmbiguousRatePlan { .. }
            | Self::EmptyRatePlan(_)
            | Self::FirstSlabNotAtZero(_)
            | Self::SlabGap { .. }
            | Self::SlabOverlap { .. }
            | Self::OpenSlabNotLast { .. }
            | Self::NoSlabs => ErrorKind::BusinessRule,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoRatePlan { .. } => "NO_RATE_PLAN",
            Self::AmbiguousRatePlan { .. } => "AMBIGUOUS_RATE_PLAN",
            Self::DuplicateSlabOrder(_) => "DUPLICATE_SLAB_ORDER",
            Self::InvalidSlabRange { .. } => "INVALID_SLAB_RANGE",
            Self::NegativeRate { .. } => "NEGATIVE_RATE",
            Self::NegativeQuantity(_) => "NEGATIVE_QUANTITY",
            Self::EmptyRatePlan(_)
            | Self::FirstSlabNotAtZero(_)
            | Self::SlabGap { .. }
            | Self::SlabOverlap { .. }
            | Self::OpenSlabNotLast { .. }
            | Self::NoSlabs => "INVALID_RATE_PLAN",
        }
    }
}
