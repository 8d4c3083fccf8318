//! Core billing logic for Leasebill.
//!
//! This crate contains pure business logic with ZERO storage or runtime dependencies.
//! All domain types, validation rules, and calculations live here; nothing in
//! this crate awaits.
//!
//! # Modules
//!
//! - `period` - Billing period arithmetic
//! - `lease` - Lease, billing settings and recurring charge inputs
//! - `rating` - Tiered utility rate plans and slab billing
//! - `proration` - Partial-period amounts for recurring charges
//! - `statement` - Utility statements and their finalization
//! - `invoice` - Invoice aggregate, status machine and builder
//! - `invoice_run` - Batch invoice run aggregate
//! - `payment` - Payments, credit notes and the balance ledger
//! - `concurrency` - Version tokens for optimistic concurrency
//! - `error` - Error taxonomy shared by every module

pub mod concurrency;
pub mod error;
pub mod invoice;
pub mod invoice_run;
pub mod lease;
pub mod payment;
pub mod period;
pub mod proration;
pub mod rating;
pub mod statement;

pub use concurrency::{INITIAL_VERSION, Versioned};
pub use error::{BillingError, BillingResult, ErrorKind};
pub use period::{BillingPeriod, PeriodError};
