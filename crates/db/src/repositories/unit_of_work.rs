//! Document sequences and atomic multi-entity commits.

use async_trait::async_trait;

use leasebill_core::invoice::Invoice;
use leasebill_core::payment::{CreditNote, Payment};

use super::error::StoreResult;

/// Independent document number sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// `INV-000001`, ...
    Invoice,
    /// `CN-000001`, ...
    CreditNote,
}

/// Atomic counter per sequence kind.
///
/// Values are unique and increasing; a value taken by a unit of work that
/// later fails is not handed out again, so gaps are possible.
#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Take the next value, starting at 1.
    async fn next_value(&self, kind: SequenceKind) -> StoreResult<u64>;
}

/// One write inside a `ChangeSet`.
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert an invoice.
    InsertInvoice(Invoice),
    /// Compare-and-swap an invoice.
    UpdateInvoice {
        /// New state.
        invoice: Invoice,
        /// Version the writer read.
        expected_version: i64,
    },
    /// Insert a payment.
    InsertPayment(Payment),
    /// Compare-and-swap a payment.
    UpdatePayment {
        /// New state.
        payment: Payment,
        /// Version the writer read.
        expected_version: i64,
    },
    /// Insert a credit note.
    InsertCreditNote(CreditNote),
}

/// Writes committed together or not at all.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an invoice insert.
    #[must_use]
    pub fn insert_invoice(mut self, invoice: Invoice) -> Self {
        self.changes.push(Change::InsertInvoice(invoice));
        self
    }

    /// Adds a versioned invoice update.
    #[must_use]
    pub fn update_invoice(mut self, invoice: Invoice, expected_version: i64) -> Self {
        self.changes.push(Change::UpdateInvoice {
            invoice,
            expected_version,
        });
        self
    }

    /// Adds a payment insert.
    #[must_use]
    pub fn insert_payment(mut self, payment: Payment) -> Self {
        self.changes.push(Change::InsertPayment(payment));
        self
    }

    /// Adds a versioned payment update.
    #[must_use]
    pub fn update_payment(mut self, payment: Payment, expected_version: i64) -> Self {
        self.changes.push(Change::UpdatePayment {
            payment,
            expected_version,
        });
        self
    }

    /// Adds a credit note insert.
    #[must_use]
    pub fn insert_credit_note(mut self, credit_note: CreditNote) -> Self {
        self.changes.push(Change::InsertCreditNote(credit_note));
        self
    }

    /// Returns true if nothing was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The queued writes in insertion order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// Stored copies written by a commit, in change order per entity.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    /// Inserted or updated invoices.
    pub invoices: Vec<Invoice>,
    /// Inserted or updated payments.
    pub payments: Vec<Payment>,
    /// Inserted credit notes.
    pub credit_notes: Vec<CreditNote>,
}

/// Atomic commit of several writes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Validate every change (versions, unique keys) and then apply all of
    /// them. On error nothing is written.
    async fn commit(&self, changes: ChangeSet) -> StoreResult<CommitReceipt>;
}
