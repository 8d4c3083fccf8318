//! Invoices.
//!
//! This module provides the invoice aggregate, its status machine and the
//! pure builder that assembles a Draft invoice for one lease and period.
//!
//! # Modules
//!
//! - `types` - Invoice, lines, kinds, statuses and manual adjustments
//! - `error` - Invoice error types
//! - `builder` - Pure invoice assembly

pub mod builder;
pub mod error;
pub mod types;

#[cfg(test)]
mod builder_props;

pub use builder::{BuildOutcome, BuildRequest, InvoiceBuilder, InvoiceDraft};
pub use error::InvoiceError;
pub use types::{
    AdjustmentKind, Invoice, InvoiceKind, InvoiceLine, InvoiceStatus, LineSource, ManualAdjustment,
};
