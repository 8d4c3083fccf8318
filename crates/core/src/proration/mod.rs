//! Partial-period amounts for recurring charges.
//!
//! # Modules
//!
//! - `calculator` - Proration arithmetic
//! - `error` - Proration error types

pub mod calculator;
pub mod error;

#[cfg(test)]
mod calculator_props;

pub use calculator::{Proration, ProrationCalculator, ProrationMethod};
pub use error::ProrationError;
