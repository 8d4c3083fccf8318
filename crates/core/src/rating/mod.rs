//! Tiered utility rate plans.
//!
//! This module selects the rate plan applicable to a utility reading and
//! prices consumption against its slabs.
//!
//! # Modules
//!
//! - `types` - Rate plan and slab types
//! - `error` - Rating error types
//! - `resolver` - Plan selection and slab contiguity validation
//! - `slab` - Slab billing calculation

pub mod error;
pub mod resolver;
pub mod slab;
pub mod types;

#[cfg(test)]
mod slab_props;

pub use error::RatingError;
pub use resolver::RatePlanResolver;
pub use slab::{SlabBillingCalculator, SlabCharge, SlabUsage};
pub use types::{ResolvedRatePlan, UtilityRatePlan, UtilityRateSlab, UtilityType};
