//! Invoice domain types.
//!
//! An invoice owns its lines. Totals are always derived from the lines:
//! `total = subtotal + tax - credited` and `balance = total - paid`,
//! never below zero while the invoice is live.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{
    InvoiceId, InvoiceLineId, LeaseId, OrganizationId, RecurringChargeId, StatementId, round_money,
    tax_on,
};

use super::error::InvoiceError;
use crate::concurrency::{INITIAL_VERSION, Versioned};
use crate::lease::ChargeType;
use crate::period::BillingPeriod;

/// Invoice status.
///
/// The valid transitions are:
/// - Draft → Issued | Void
/// - Issued → PartiallyPaid | Paid | Overdue | Void
/// - PartiallyPaid → Paid | Overdue | Issued
/// - Overdue → PartiallyPaid | Paid | Void
/// - Paid → PartiallyPaid | Issued (refunds)
/// - Void is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being assembled; may be regenerated.
    Draft,
    /// Sent to the tenant; awaiting payment.
    Issued,
    /// Some money collected.
    PartiallyPaid,
    /// Fully settled.
    Paid,
    /// Past due date with a balance.
    Overdue,
    /// Cancelled (immutable).
    Void,
}

impl InvoiceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Void => "void",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "issued" => Some(Self::Issued),
            "partially_paid" => Some(Self::PartiallyPaid),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "void" => Some(Self::Void),
            _ => None,
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Issued | Self::Void)
                | (
                    Self::Issued,
                    Self::PartiallyPaid | Self::Paid | Self::Overdue | Self::Void
                )
                | (
                    Self::PartiallyPaid,
                    Self::Paid | Self::Overdue | Self::Issued
                )
                | (Self::Overdue, Self::PartiallyPaid | Self::Paid | Self::Void)
                | (Self::Paid, Self::PartiallyPaid | Self::Issued)
        )
    }

    /// Returns true if payments may be recorded against the invoice.
    #[must_use]
    pub fn accepts_payments(&self) -> bool {
        matches!(self, Self::Issued | Self::PartiallyPaid | Self::Overdue)
    }

    /// Returns true if the invoice blocks another invoice for the same lease and period.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Void)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which run family an invoice belongs to.
///
/// Monthly runs produce `Regular` invoices, utility runs `Utility` ones, so
/// both can exist for the same lease and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    /// Recurring charges plus any finalized statements and adjustments.
    Regular,
    /// Utility statements only.
    Utility,
}

impl InvoiceKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Utility => "utility",
        }
    }
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an invoice line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LineSource {
    /// A lease recurring charge template.
    RecurringCharge(RecurringChargeId),
    /// A finalized utility statement.
    UtilityStatement(StatementId),
    /// A manual adjustment entered at generation time.
    Adjustment,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Unique identifier.
    pub id: InvoiceLineId,
    /// Position on the invoice, from 1.
    pub line_number: u32,
    /// Line classification.
    pub charge_type: ChargeType,
    /// Printed description.
    pub description: String,
    /// Origin of the line.
    pub source: LineSource,
    /// Quantity billed.
    pub quantity: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
    /// `quantity × unit_price`, rounded.
    pub line_amount: Decimal,
    /// Tax rate in percent.
    pub tax_rate: Decimal,
    /// Tax on `line_amount`.
    pub tax_amount: Decimal,
    /// `line_amount + tax_amount`.
    pub line_total: Decimal,
    /// Sum of credit note lines against this line.
    pub credited_amount: Decimal,
}

impl InvoiceLine {
    /// Builds a single-quantity line and computes its tax.
    #[must_use]
    pub fn new(
        line_number: u32,
        charge_type: ChargeType,
        description: impl Into<String>,
        source: LineSource,
        amount: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        let line_amount = round_money(amount);
        let tax_amount = tax_on(line_amount, tax_rate);
        Self {
            id: InvoiceLineId::new(),
            line_number,
            charge_type,
            description: description.into(),
            source,
            quantity: Decimal::ONE,
            unit_price: line_amount,
            line_amount,
            tax_rate,
            tax_amount,
            line_total: line_amount + tax_amount,
            credited_amount: Decimal::ZERO,
        }
    }

    /// What a credit note may still take from this line.
    #[must_use]
    pub fn creditable_amount(&self) -> Decimal {
        (self.line_total - self.credited_amount).max(Decimal::ZERO)
    }

    /// Returns true if the line bills the given statement.
    #[must_use]
    pub fn bills_statement(&self, statement_id: StatementId) -> bool {
        self.source == LineSource::UtilityStatement(statement_id)
    }
}

/// Direction of a manual adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Adds to the invoice.
    Charge,
    /// Reduces the invoice.
    Discount,
}

/// A one-off line supplied when generating a single invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    /// Charge or discount.
    pub kind: AdjustmentKind,
    /// Printed description.
    pub description: String,
    /// Positive magnitude; discounts are negated on the line.
    pub amount: Decimal,
    /// Tax rate in percent.
    pub tax_rate: Decimal,
}

impl ManualAdjustment {
    /// Validates the adjustment.
    pub fn validate(&self) -> Result<(), InvoiceError> {
        if self.description.trim().is_empty() {
            return Err(InvoiceError::InvalidAdjustment(
                "description is required".to_string(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(InvoiceError::InvalidAdjustment(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.tax_rate < Decimal::ZERO {
            return Err(InvoiceError::InvalidAdjustment(format!(
                "tax rate cannot be negative, got {}",
                self.tax_rate
            )));
        }
        Ok(())
    }

    /// Signed line amount.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            AdjustmentKind::Charge => self.amount,
            AdjustmentKind::Discount => -self.amount,
        }
    }
}

/// Invoice aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier.
    pub id: InvoiceId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Lease billed.
    pub lease_id: LeaseId,
    /// Globally unique document number.
    pub invoice_number: String,
    /// Run family.
    pub kind: InvoiceKind,
    /// Document date.
    pub invoice_date: NaiveDate,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Period billed.
    pub period: BillingPeriod,
    /// Lifecycle status.
    pub status: InvoiceStatus,
    /// Sum of line amounts.
    pub subtotal: Decimal,
    /// Sum of line taxes.
    pub tax_amount: Decimal,
    /// Sum of credit notes applied.
    pub credited_amount: Decimal,
    /// `subtotal + tax_amount - credited_amount`.
    pub total_amount: Decimal,
    /// Sum of completed payments.
    pub paid_amount: Decimal,
    /// Outstanding amount.
    pub balance_amount: Decimal,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Lines in `line_number` order.
    pub lines: Vec<InvoiceLine>,
    /// When the invoice was issued.
    pub issued_at: Option<DateTime<Utc>>,
    /// When the invoice was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Why the invoice was voided.
    pub void_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Version token.
    pub version: i64,
}

impl Invoice {
    /// Creates a Draft invoice from lines and derives its totals.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        lease_id: LeaseId,
        invoice_number: String,
        kind: InvoiceKind,
        invoice_date: NaiveDate,
        due_date: NaiveDate,
        period: BillingPeriod,
        lines: Vec<InvoiceLine>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut invoice = Self {
            id: InvoiceId::new(),
            organization_id,
            lease_id,
            invoice_number,
            kind,
            invoice_date,
            due_date,
            period,
            status: InvoiceStatus::Draft,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            credited_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            balance_amount: Decimal::ZERO,
            notes: None,
            lines,
            issued_at: None,
            voided_at: None,
            void_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: INITIAL_VERSION,
        };
        invoice.recalculate_totals();
        invoice
    }

    /// Re-derives subtotal, tax, credited, total and balance from the lines.
    pub fn recalculate_totals(&mut self) {
        self.subtotal = self.lines.iter().map(|l| l.line_amount).sum();
        self.tax_amount = self.lines.iter().map(|l| l.tax_amount).sum();
        self.credited_amount = self.lines.iter().map(|l| l.credited_amount).sum();
        self.total_amount = self.subtotal + self.tax_amount - self.credited_amount;
        self.balance_amount = if self.status == InvoiceStatus::Void {
            Decimal::ZERO
        } else {
            (self.total_amount - self.paid_amount).max(Decimal::ZERO)
        };
    }

    /// Moves to `to` if the status table allows it.
    ///
    /// Returns `Ok(false)` when already in `to`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for moves outside the table.
    pub fn transition_to(
        &mut self,
        to: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, InvoiceError> {
        if self.status == to {
            return Ok(false);
        }
        if !self.status.can_transition_to(to) {
            return Err(InvoiceError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(true)
    }

    /// Issue a Draft invoice.
    ///
    /// # Errors
    ///
    /// `EmptyInvoice` when there are no lines, `InvalidTransition` when not Draft.
    pub fn issue(&mut self, now: DateTime<Utc>) -> Result<(), InvoiceError> {
        if self.lines.is_empty() {
            return Err(InvoiceError::EmptyInvoice(self.id));
        }
        if self.status != InvoiceStatus::Draft {
            return Err(InvoiceError::InvalidTransition {
                from: self.status,
                to: InvoiceStatus::Issued,
            });
        }
        self.transition_to(InvoiceStatus::Issued, now)?;
        self.issued_at = Some(now);
        Ok(())
    }

    /// Void the invoice.
    ///
    /// # Errors
    ///
    /// `VoidReasonRequired` for a blank reason, `HasPayments` when money was
    /// collected, `InvalidTransition` from Paid, PartiallyPaid or Void.
    pub fn void(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), InvoiceError> {
        if reason.trim().is_empty() {
            return Err(InvoiceError::VoidReasonRequired);
        }
        if self.paid_amount > Decimal::ZERO {
            return Err(InvoiceError::HasPayments {
                invoice_id: self.id,
                paid: self.paid_amount,
            });
        }
        if !self.status.can_transition_to(InvoiceStatus::Void) {
            return Err(InvoiceError::InvalidTransition {
                from: self.status,
                to: InvoiceStatus::Void,
            });
        }
        self.transition_to(InvoiceStatus::Void, now)?;
        self.balance_amount = Decimal::ZERO;
        self.voided_at = Some(now);
        self.void_reason = Some(reason.trim().to_string());
        Ok(())
    }

    /// Returns true if the invoice is unpaid past its due date on `as_of`.
    #[must_use]
    pub fn is_overdue_on(&self, as_of: NaiveDate) -> bool {
        matches!(
            self.status,
            InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid
        ) && self.due_date < as_of
            && self.balance_amount > Decimal::ZERO
    }

    /// Returns true if any line bills the given statement.
    #[must_use]
    pub fn bills_statement(&self, statement_id: StatementId) -> bool {
        self.lines.iter().any(|l| l.bills_statement(statement_id))
    }

    /// Looks up a line by id.
    #[must_use]
    pub fn line(&self, line_id: InvoiceLineId) -> Option<&InvoiceLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }
}

impl Versioned for Invoice {
    const ENTITY: &'static str = "invoice";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
