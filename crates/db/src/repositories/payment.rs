//! Payments and credit notes.

use async_trait::async_trait;

use leasebill_core::payment::{CreditNote, Payment};
use leasebill_shared::types::{CreditNoteId, InvoiceId, PaymentId};

use super::error::StoreResult;

/// Payments.
///
/// Adapters must treat the status history as append-only: an update whose
/// history does not extend the stored one is refused.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Get a payment.
    async fn get_payment(&self, id: PaymentId) -> StoreResult<Payment>;

    /// Payments recorded against an invoice, oldest first.
    async fn list_payments_by_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>>;

    /// Insert a payment at the initial version.
    async fn add_payment(&self, payment: Payment) -> StoreResult<Payment>;

    /// Compare-and-swap update; returns the stored copy at its new version.
    async fn update_payment(&self, payment: Payment, expected_version: i64) -> StoreResult<Payment>;
}

/// Credit notes. Immutable once written.
#[async_trait]
pub trait CreditNoteRepository: Send + Sync {
    /// Get a credit note.
    async fn get_credit_note(&self, id: CreditNoteId) -> StoreResult<CreditNote>;

    /// Credit notes issued against an invoice, oldest first.
    async fn list_credit_notes_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> StoreResult<Vec<CreditNote>>;
}
