//! Payment error types.

use rust_decimal::Decimal;
use thiserror::Error;

use leasebill_shared::types::{InvoiceId, InvoiceLineId};

use super::types::PaymentStatus;
use crate::error::ErrorKind;
use crate::invoice::{InvoiceError, InvoiceStatus};

/// Errors that can occur while recording payments or credit notes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    // ========== Validation Errors ==========
    /// Amount is zero or negative.
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// A reason is mandatory for this change.
    #[error("Reason is required")]
    ReasonRequired,

    /// Attachment metadata is incomplete.
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    /// Credit note has no lines.
    #[error("Credit note must have at least one line")]
    EmptyCreditNote,

    /// A credit line references a line not on the invoice.
    #[error("Invoice line {0} does not belong to the invoice")]
    UnknownInvoiceLine(InvoiceLineId),

    /// Two credit lines reference the same invoice line.
    #[error("Invoice line {0} is credited twice in one credit note")]
    DuplicateCreditLine(InvoiceLineId),

    // ========== Business Rule Errors ==========
    /// Invoice status does not accept payments.
    #[error("Invoice {invoice_id} is {status} and does not accept payments")]
    InvoiceNotPayable {
        /// Invoice id.
        invoice_id: InvoiceId,
        /// Current status.
        status: InvoiceStatus,
    },

    /// Invoice status does not accept credit notes.
    #[error("Invoice {invoice_id} is {status} and cannot be credited")]
    InvoiceNotCreditable {
        /// Invoice id.
        invoice_id: InvoiceId,
        /// Current status.
        status: InvoiceStatus,
    },

    /// Payment would push the balance below zero by more than the tolerance.
    #[error("Payment of {amount} exceeds balance {balance} by more than {tolerance}")]
    Overpayment {
        /// Outstanding balance.
        balance: Decimal,
        /// Amount offered.
        amount: Decimal,
        /// Configured tolerance.
        tolerance: Decimal,
    },

    /// Reversal larger than what was paid.
    #[error("Cannot reverse {amount}, only {paid} has been paid")]
    ReversalExceedsPaid {
        /// Amount paid so far.
        paid: Decimal,
        /// Amount to reverse.
        amount: Decimal,
    },

    /// Credit line larger than the line's remaining amount.
    #[error("Credit of {requested} on line {line_id} exceeds remaining {available}")]
    InvalidCreditAmount {
        /// Invoice line.
        line_id: InvoiceLineId,
        /// Amount requested.
        requested: Decimal,
        /// Amount still creditable.
        available: Decimal,
    },

    /// Credit note total larger than the invoice balance.
    #[error("Credit note total {total} exceeds invoice balance {balance}")]
    CreditExceedsBalance {
        /// Credit note total.
        total: Decimal,
        /// Outstanding balance.
        balance: Decimal,
    },

    /// Payment status change outside the state machine.
    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: PaymentStatus,
        /// Requested status.
        to: PaymentStatus,
    },

    /// Invoice status change failed.
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
}

impl PaymentError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::ReasonRequired
            | Self::InvalidAttachment(_)
            | Self::EmptyCreditNote
            | Self::UnknownInvoiceLine(_)
            | Self::DuplicateCreditLine(_)
            | Self::InvalidCreditAmount { .. } => ErrorKind::Validation,
            Self::InvoiceNotPayable { .. }
            | Self::InvoiceNotCreditable { .. }
            | Self::Overpayment { .. }
            | Self::ReversalExceedsPaid { .. }
            | Self::CreditExceedsBalance { .. }
            | Self::InvalidTransition { .. } => ErrorKind::BusinessRule,
            Self::Invoice(e) => e.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::InvalidAttachment(_) => "INVALID_ATTACHMENT",
            Self::EmptyCreditNote => "EMPTY_CREDIT_NOTE",
            Self::UnknownInvoiceLine(_) => "UNKNOWN_INVOICE_LINE",
            Self::DuplicateCreditLine(_) => "DUPLICATE_CREDIT_LINE",
            Self::InvoiceNotPayable { .. } => "INVOICE_NOT_PAYABLE",
            Self::InvoiceNotCreditable { .. } => "INVOICE_NOT_CREDITABLE",
            Self::Overpayment { .. } => "OVERPAYMENT",
            Self::ReversalExceedsPaid { .. } => "REVERSAL_EXCEEDS_PAID",
            Self::InvalidCreditAmount { .. } => "INVALID_CREDIT_AMOUNT",
            Self::CreditExceedsBalance { .. } => "CREDIT_EXCEEDS_BALANCE",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Invoice(e) => e.error_code(),
        }
    }
}
