//! Storage contracts consumed by the billing services.
//!
//! Each aggregate gets a narrow repository trait. Updates take the version
//! the caller read and fail with `StoreError::VersionConflict` when the
//! stored row moved on; that compare-and-swap is the only concurrency
//! control the services rely on.
//!
//! # Modules
//!
//! - `error` - Store failures and their mapping to `BillingError`
//! - `lease` - Leases, billing settings and recurring charges
//! - `rate_plan` - Utility rate plans
//! - `statement` - Utility statements
//! - `invoice` - Invoices
//! - `invoice_run` - Invoice runs
//! - `payment` - Payments and credit notes
//! - `unit_of_work` - Document sequences and atomic multi-entity commits

pub mod error;
pub mod invoice;
pub mod invoice_run;
pub mod lease;
pub mod payment;
pub mod rate_plan;
pub mod statement;
pub mod unit_of_work;

pub use error::{StoreError, StoreResult};
pub use invoice::{InvoiceFilter, InvoiceRepository};
pub use invoice_run::InvoiceRunRepository;
pub use lease::LeaseRepository;
pub use payment::{CreditNoteRepository, PaymentRepository};
pub use rate_plan::RatePlanRepository;
pub use statement::{StatementFilter, StatementRepository};
pub use unit_of_work::{Change, ChangeSet, CommitReceipt, SequenceGenerator, SequenceKind, UnitOfWork};

/// Everything a billing service needs from storage.
///
/// Implemented for any type that implements every repository contract, so
/// services take a single `Arc<S: BillingStore>`.
pub trait BillingStore:
    LeaseRepository
    + RatePlanRepository
    + StatementRepository
    + InvoiceRepository
    + InvoiceRunRepository
    + PaymentRepository
    + CreditNoteRepository
    + SequenceGenerator
    + UnitOfWork
    + Send
    + Sync
    + 'static
{
}

impl<T> BillingStore for T where
    T: LeaseRepository
        + RatePlanRepository
        + StatementRepository
        + InvoiceRepository
        + InvoiceRunRepository
        + PaymentRepository
        + CreditNoteRepository
        + SequenceGenerator
        + UnitOfWork
        + Send
        + Sync
        + 'static
{
}
