//! Invoice error types.

use rust_decimal::Decimal;
use thiserror::Error;

use leasebill_shared::types::{InvoiceId, LeaseId};

use super::types::{InvoiceKind, InvoiceStatus};
use crate::error::ErrorKind;
use crate::period::{BillingPeriod, PeriodError};
use crate::proration::ProrationError;

/// Errors that can occur while building or transitioning invoices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    // ========== Build Errors ==========
    /// The lease has no billing settings.
    #[error("Lease {0} has no billing settings")]
    MissingBillingSettings(LeaseId),

    /// The lease is not active during the period.
    #[error("Lease {lease_id} is not billable for {period}")]
    LeaseNotBillable {
        /// Lease requested.
        lease_id: LeaseId,
        /// Period requested.
        period: BillingPeriod,
    },

    /// A non-draft invoice already exists for the lease, kind and period.
    #[error("A {status} {kind} invoice {invoice_number} already exists for lease {lease_id} and {period}")]
    DuplicateInvoice {
        /// Lease requested.
        lease_id: LeaseId,
        /// Invoice kind requested.
        kind: InvoiceKind,
        /// Period requested.
        period: BillingPeriod,
        /// Status of the blocking invoice.
        status: InvoiceStatus,
        /// Number of the blocking invoice.
        invoice_number: String,
    },

    /// No charges, statements or adjustments apply.
    #[error("Nothing to invoice for lease {lease_id} in {period}")]
    NothingToInvoice {
        /// Lease requested.
        lease_id: LeaseId,
        /// Period requested.
        period: BillingPeriod,
    },

    /// Discounts outweigh charges.
    #[error("Invoice total cannot be negative: {0}")]
    NegativeInvoiceTotal(Decimal),

    /// A manual adjustment is malformed.
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    // ========== State Errors ==========
    /// Transition not in the status table.
    #[error("Invalid invoice status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: InvoiceStatus,
        /// Requested status.
        to: InvoiceStatus,
    },

    /// Issuing an invoice without lines.
    #[error("Invoice {0} has no lines and cannot be issued")]
    EmptyInvoice(InvoiceId),

    /// Voiding requires a reason.
    #[error("Void reason is required")]
    VoidReasonRequired,

    /// Voiding an invoice that has collected money.
    #[error("Invoice {invoice_id} has {paid} paid and cannot be voided")]
    HasPayments {
        /// Invoice requested.
        invoice_id: InvoiceId,
        /// Amount already paid.
        paid: Decimal,
    },

    // ========== Calculation Errors ==========
    /// Proration failed.
    #[error(transparent)]
    Proration(#[from] ProrationError),

    /// Period arithmetic failed.
    #[error(transparent)]
    Period(#[from] PeriodError),
}

impl InvoiceError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAdjustment(_) | Self::VoidReasonRequired => ErrorKind::Validation,
            Self::DuplicateInvoice { .. } => ErrorKind::Conflict,
            Self::MissingBillingSettings(_)
            | Self::LeaseNotBillable { .. }
            | Self::NothingToInvoice { .. }
            | Self::NegativeInvoiceTotal(_)
            | Self::InvalidTransition { .. }
            | Self::EmptyInvoice(_)
            | Self::HasPayments { .. } => ErrorKind::BusinessRule,
            Self::Proration(e) => e.kind(),
            Self::Period(e) => e.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingBillingSettings(_) => "MISSING_BILLING_SETTINGS",
            Self::LeaseNotBillable { .. } => "LEASE_NOT_BILLABLE",
            Self::DuplicateInvoice { .. } => "DUPLICATE_INVOICE",
            Self::NothingToInvoice { .. } => "NOTHING_TO_INVOICE",
            Self::NegativeInvoiceTotal(_) => "NEGATIVE_INVOICE_TOTAL",
            Self::InvalidAdjustment(_) => "INVALID_ADJUSTMENT",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::EmptyInvoice(_) => "EMPTY_INVOICE",
            Self::VoidReasonRequired => "VOID_REASON_REQUIRED",
            Self::HasPayments { .. } => "INVOICE_HAS_PAYMENTS",
            Self::Proration(e) => e.error_code(),
            Self::Period(e) => e.error_code(),
        }
    }
}
