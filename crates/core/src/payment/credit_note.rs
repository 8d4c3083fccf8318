//! Credit notes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use leasebill_shared::types::{CreditNoteId, InvoiceId, InvoiceLineId, OrganizationId, UserId};

/// Amount to credit against one invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLineRequest {
    /// Line being credited.
    pub invoice_line_id: InvoiceLineId,
    /// Amount to credit, tax inclusive.
    pub amount: Decimal,
    /// Printed description; defaults to the invoice line's.
    pub description: Option<String>,
}

/// One line of a credit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteLine {
    /// Position on the credit note, from 1.
    pub line_number: u32,
    /// Invoice line credited.
    pub invoice_line_id: InvoiceLineId,
    /// Printed description.
    pub description: String,
    /// Amount credited.
    pub amount: Decimal,
}

/// A document reducing an issued invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNote {
    /// Unique identifier.
    pub id: CreditNoteId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Invoice credited.
    pub invoice_id: InvoiceId,
    /// Globally unique document number.
    pub credit_note_number: String,
    /// Document date.
    pub credit_date: NaiveDate,
    /// Sum of line amounts.
    pub total_amount: Decimal,
    /// Why the credit was issued.
    pub reason: String,
    /// Lines, one per credited invoice line.
    pub lines: Vec<CreditNoteLine>,
    /// Issuer.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CreditNote {
    /// Creates a credit note; the total is the sum of `lines`.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        credit_note_number: String,
        credit_date: NaiveDate,
        reason: String,
        lines: Vec<CreditNoteLine>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let total_amount = lines.iter().map(|l| l.amount).sum();
        Self {
            id: CreditNoteId::new(),
            organization_id,
            invoice_id,
            credit_note_number,
            credit_date,
            total_amount,
            reason,
            lines,
            created_by,
            created_at: now,
        }
    }
}
