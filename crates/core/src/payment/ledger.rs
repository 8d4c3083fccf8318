//! Invoice balance arithmetic.
//!
//! Every function here mutates one invoice in memory and leaves persistence
//! to the caller. Settlement rules:
//!
//! - balance is `total - paid`, clamped at zero within the overpayment tolerance
//! - balance zero → Paid; something paid → PartiallyPaid
//! - an Overdue invoice stays Overdue until it is settled

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use leasebill_shared::types::round_money;

use super::credit_note::{CreditLineRequest, CreditNoteLine};
use super::error::PaymentError;
use crate::invoice::{Invoice, InvoiceStatus};

/// Balance position after a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Status before the operation.
    pub previous_status: InvoiceStatus,
    /// Status after the operation.
    pub status: InvoiceStatus,
    /// Paid amount after the operation.
    pub paid_amount: Decimal,
    /// Balance after the operation.
    pub balance_amount: Decimal,
}

/// Stateless ledger service.
pub struct PaymentLedger;

impl PaymentLedger {
    /// Apply a completed payment to an invoice.
    ///
    /// # Arguments
    ///
    /// * `invoice` - Invoice to update in place
    /// * `amount` - Payment amount (positive)
    /// * `tolerance` - How far below zero the balance may go before it is an overpayment
    /// * `now` - Modification timestamp
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `InvoiceNotPayable` unless Issued, PartiallyPaid or
    /// Overdue, `Overpayment` beyond the tolerance.
    pub fn apply_payment(
        invoice: &mut Invoice,
        amount: Decimal,
        tolerance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Settlement, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }
        if !invoice.status.accepts_payments() {
            return Err(PaymentError::InvoiceNotPayable {
                invoice_id: invoice.id,
                status: invoice.status,
            });
        }

        let amount = round_money(amount);
        let paid = invoice.paid_amount + amount;
        if invoice.total_amount - paid < -tolerance {
            return Err(PaymentError::Overpayment {
                balance: invoice.balance_amount,
                amount,
                tolerance,
            });
        }

        let previous_status = invoice.status;
        invoice.paid_amount = paid;
        invoice.recalculate_totals();
        Self::settle(invoice, now)?;

        Ok(Self::settlement(invoice, previous_status))
    }

    /// Take back a previously applied payment (refund).
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `ReversalExceedsPaid` when more than was paid.
    pub fn reverse_payment(
        invoice: &mut Invoice,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Settlement, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }
        let amount = round_money(amount);
        if amount > invoice.paid_amount {
            return Err(PaymentError::ReversalExceedsPaid {
                paid: invoice.paid_amount,
                amount,
            });
        }

        let previous_status = invoice.status;
        invoice.paid_amount -= amount;
        invoice.recalculate_totals();
        Self::settle(invoice, now)?;

        Ok(Self::settlement(invoice, previous_status))
    }

    /// Credit individual invoice lines.
    ///
    /// Returns the numbered credit note lines; the caller wraps them in a
    /// `CreditNote`.
    ///
    /// # Errors
    ///
    /// * `InvoiceNotCreditable` - invoice is Draft or Void
    /// * `EmptyCreditNote` - no lines
    /// * `UnknownInvoiceLine` / `DuplicateCreditLine` - bad line references
    /// * `InvalidCreditAmount` - non-positive, or above the line's remaining amount
    /// * `CreditExceedsBalance` - note total above the invoice balance
    pub fn apply_credit(
        invoice: &mut Invoice,
        requests: &[CreditLineRequest],
        now: DateTime<Utc>,
    ) -> Result<(Vec<CreditNoteLine>, Settlement), PaymentError> {
        if matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Void) {
            return Err(PaymentError::InvoiceNotCreditable {
                invoice_id: invoice.id,
                status: invoice.status,
            });
        }
        if requests.is_empty() {
            return Err(PaymentError::EmptyCreditNote);
        }

        let mut seen = HashSet::with_capacity(requests.len());
        let mut lines = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if !seen.insert(request.invoice_line_id) {
                return Err(PaymentError::DuplicateCreditLine(request.invoice_line_id));
            }
            let line = invoice
                .line(request.invoice_line_id)
                .ok_or(PaymentError::UnknownInvoiceLine(request.invoice_line_id))?;

            let available = line.creditable_amount();
            if request.amount <= Decimal::ZERO || request.amount > available {
                return Err(PaymentError::InvalidCreditAmount {
                    line_id: line.id,
                    requested: request.amount,
                    available,
                });
            }

            lines.push(CreditNoteLine {
                line_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
                invoice_line_id: line.id,
                description: request
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| line.description.clone()),
                amount: round_money(request.amount),
            });
        }

        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        if total > invoice.balance_amount {
            return Err(PaymentError::CreditExceedsBalance {
                total,
                balance: invoice.balance_amount,
            });
        }

        let previous_status = invoice.status;
        for credit in &lines {
            if let Some(line) = invoice
                .lines
                .iter_mut()
                .find(|l| l.id == credit.invoice_line_id)
            {
                line.credited_amount += credit.amount;
            }
        }
        invoice.recalculate_totals();
        Self::settle(invoice, now)?;

        Ok((lines, Self::settlement(invoice, previous_status)))
    }

    /// Status an invoice should hold for its current paid and balance amounts.
    #[must_use]
    pub fn settled_status(invoice: &Invoice) -> InvoiceStatus {
        if invoice.balance_amount.is_zero() {
            InvoiceStatus::Paid
        } else if invoice.status == InvoiceStatus::Overdue {
            InvoiceStatus::Overdue
        } else if invoice.paid_amount > Decimal::ZERO {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Issued
        }
    }

    fn settle(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), PaymentError> {
        let target = Self::settled_status(invoice);
        invoice.transition_to(target, now)?;
        invoice.updated_at = now;
        Ok(())
    }

    fn settlement(invoice: &Invoice, previous_status: InvoiceStatus) -> Settlement {
        Settlement {
            previous_status,
            status: invoice.status,
            paid_amount: invoice.paid_amount,
            balance_amount: invoice.balance_amount,
        }
    }
}
