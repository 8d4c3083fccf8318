//! Command services.
//!
//! Each service owns an `Arc` of the store and wraps every command in a
//! unit of work run by the `RetryPolicy`. Pure decisions are delegated to
//! `leasebill-core`; the services only read, call core and write back.
//!
//! # Modules
//!
//! - `invoice` - Single-invoice generation and the invoice status commands
//! - `invoice_run` - Batch invoice runs
//! - `payment` - Payments, payment status changes and credit notes
//! - `statement` - Utility statement capture and finalization

pub mod invoice;
pub mod invoice_run;
pub mod payment;
pub mod statement;

pub use invoice::{GenerateInvoiceCommand, GeneratedInvoice, InvoiceService, OverdueResult};
pub use invoice_run::{CreateInvoiceRunCommand, InvoiceRunService};
pub use payment::{
    IssueCreditNoteCommand, IssuedCreditNote, PaymentLedgerService, PaymentStatusChange,
    RecordPaymentCommand, RecordedPayment,
};
pub use statement::{CreateStatementCommand, StatementService};
