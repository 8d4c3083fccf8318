//! Storage contracts and command services for Leasebill.
//!
//! This crate provides:
//! - Repository traits per aggregate, with compare-and-swap updates
//! - An in-memory store implementing every contract
//! - A retry policy that re-runs whole units of work
//! - The async command services built on `leasebill-core`

pub mod memory;
pub mod repositories;
pub mod retry;
pub mod services;

pub use memory::InMemoryStore;
pub use repositories::{BillingStore, ChangeSet, SequenceKind, StoreError, StoreResult};
pub use retry::RetryPolicy;
pub use services::{
    CreateInvoiceRunCommand, CreateStatementCommand, GenerateInvoiceCommand, InvoiceRunService,
    InvoiceService, IssueCreditNoteCommand, PaymentLedgerService, PaymentStatusChange,
    RecordPaymentCommand, StatementService,
};
