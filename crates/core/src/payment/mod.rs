//! Payments, credit notes and the invoice balance ledger.
//!
//! # Modules
//!
//! - `types` - Payment aggregate, status history and attachments
//! - `credit_note` - Credit notes and their lines
//! - `ledger` - Balance arithmetic applied to invoices
//! - `error` - Payment error types

pub mod credit_note;
pub mod error;
pub mod ledger;
pub mod types;

#[cfg(test)]
mod ledger_props;

pub use credit_note::{CreditLineRequest, CreditNote, CreditNoteLine};
pub use error::PaymentError;
pub use ledger::{PaymentLedger, Settlement};
pub use types::{
    GatewayMetadata, NewPayment, Payment, PaymentAttachment, PaymentMode, PaymentStatus,
    PaymentStatusHistory, PaymentType,
};
