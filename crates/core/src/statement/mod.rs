//! Utility statements.
//!
//! A statement is one billing-period reading (or a directly billed amount)
//! for a lease and utility. It is editable while Draft, priced when
//! finalized, and frozen for good once an invoice line references it.
//!
//! # Modules
//!
//! - `types` - Statement aggregate and its inputs
//! - `error` - Statement error types

pub mod error;
pub mod types;

pub use error::StatementError;
pub use types::{StatementInput, StatementStatus, UtilityStatement};
