//! Batch invoice runs.
//!
//! A run drives invoice generation across an organization's leases for one
//! billing window and records a per-lease outcome. The aggregate here holds
//! the state machine and counters; orchestration lives in the storage crate.
//!
//! # Modules
//!
//! - `types` - Run aggregate, items, kinds and statuses
//! - `error` - Run error types

pub mod error;
pub mod types;

pub use error::InvoiceRunError;
pub use types::{InvoiceRun, InvoiceRunItem, InvoiceRunKind, InvoiceRunStatus};
