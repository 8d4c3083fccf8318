//! Payment ledger commands.
//!
//! Every command that touches both an invoice and a payment (or credit
//! note) commits through one `UnitOfWork::commit`, so the invoice balance
//! and the payment row never disagree.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use leasebill_core::concurrency::check_version;
use leasebill_core::invoice::Invoice;
use leasebill_core::payment::{
    CreditLineRequest, CreditNote, GatewayMetadata, NewPayment, Payment, PaymentError,
    PaymentLedger, PaymentMode, PaymentStatus, PaymentStatusHistory, PaymentType,
};
use leasebill_core::{BillingError, BillingResult};
use leasebill_shared::config::{AppConfig, BillingConfig};
use leasebill_shared::types::{InvoiceId, PaymentId, UserId};

use crate::repositories::{BillingStore, ChangeSet, CommitReceipt, SequenceKind};
use crate::retry::RetryPolicy;

/// Input for `PaymentLedgerService::record_payment`.
#[derive(Debug, Clone)]
pub struct RecordPaymentCommand {
    /// Invoice paid.
    pub invoice_id: InvoiceId,
    /// Amount (positive).
    pub amount: Decimal,
    /// Payment mode.
    pub mode: PaymentMode,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Pending (awaiting clearance) or Completed (applied immediately).
    pub status: PaymentStatus,
    /// Value date.
    pub payment_date: NaiveDate,
    /// External reference.
    pub reference_number: Option<String>,
    /// Gateway details.
    pub gateway: Option<GatewayMetadata>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Who recorded the payment.
    pub recorded_by: UserId,
}

/// Input for `PaymentLedgerService::issue_credit_note`.
#[derive(Debug, Clone)]
pub struct IssueCreditNoteCommand {
    /// Invoice credited.
    pub invoice_id: InvoiceId,
    /// Document date.
    pub credit_date: NaiveDate,
    /// Why the credit is given.
    pub reason: String,
    /// Lines to credit.
    pub lines: Vec<CreditLineRequest>,
    /// Who issued the note.
    pub issued_by: UserId,
}

/// Input for `PaymentLedgerService::change_payment_status`.
#[derive(Debug, Clone)]
pub struct PaymentStatusChange {
    /// Target status.
    pub to: PaymentStatus,
    /// Who made the change.
    pub changed_by: UserId,
    /// Required for refunds and cancellations.
    pub reason: Option<String>,
}

/// A payment together with the invoice state it left behind.
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    /// Stored payment.
    pub payment: Payment,
    /// Stored invoice.
    pub invoice: Invoice,
}

/// A credit note together with the credited invoice.
#[derive(Debug, Clone)]
pub struct IssuedCreditNote {
    /// Stored credit note.
    pub credit_note: CreditNote,
    /// Stored invoice.
    pub invoice: Invoice,
}

/// Payment and credit note commands.
pub struct PaymentLedgerService<S> {
    store: Arc<S>,
    billing: BillingConfig,
    retry: RetryPolicy,
}

impl<S: BillingStore> PaymentLedgerService<S> {
    /// Creates the service.
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            billing: config.billing.clone(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record a payment against an invoice.
    ///
    /// A Completed payment is applied to the invoice balance in the same
    /// commit; a Pending one only checks that the invoice takes payments.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - amount not positive
    /// * `InvoiceNotPayable` - invoice not Issued, PartiallyPaid or Overdue
    /// * `Overpayment` - balance would drop below the tolerance
    /// * `NotFound` / `ConcurrencyConflict` / `Infrastructure`
    pub async fn record_payment(
        &self,
        command: RecordPaymentCommand,
    ) -> BillingResult<RecordedPayment> {
        let command = &command;
        let recorded = self
            .retry
            .run("record_payment", move || async move {
                self.try_record_payment(command).await
            })
            .await?;

        info!(
            payment_id = %recorded.payment.id,
            invoice_id = %recorded.invoice.id,
            amount = %recorded.payment.amount,
            status = %recorded.payment.status,
            invoice_status = %recorded.invoice.status,
            balance = %recorded.invoice.balance_amount,
            "Payment recorded"
        );
        Ok(recorded)
    }

    async fn try_record_payment(
        &self,
        command: &RecordPaymentCommand,
    ) -> BillingResult<RecordedPayment> {
        let now = Utc::now();
        let mut invoice = self.store.get_invoice(command.invoice_id).await?;
        let read_version = invoice.version;

        let payment = Payment::new(
            NewPayment {
                organization_id: invoice.organization_id,
                invoice_id: invoice.id,
                lease_id: invoice.lease_id,
                amount: command.amount,
                mode: command.mode,
                payment_type: command.payment_type,
                status: command.status,
                payment_date: command.payment_date,
                reference_number: command.reference_number.clone(),
                gateway: command.gateway.clone(),
                notes: command.notes.clone(),
            },
            command.recorded_by,
            now,
        )?;

        if payment.status.counts_toward_invoice() {
            PaymentLedger::apply_payment(
                &mut invoice,
                payment.amount,
                self.billing.overpayment_tolerance,
                now,
            )?;
        } else if !invoice.status.accepts_payments() {
            return Err(PaymentError::InvoiceNotPayable {
                invoice_id: invoice.id,
                status: invoice.status,
            }
            .into());
        }

        // Version-checked even when a pending payment leaves it unchanged.
        let changes = ChangeSet::new()
            .update_invoice(invoice, read_version)
            .insert_payment(payment);
        let receipt = self.store.commit(changes).await?;
        into_recorded(receipt)
    }

    /// Move a payment through its status machine.
    ///
    /// Pending → Completed applies the amount to the invoice; Completed →
    /// Refunded takes it back. Both happen in the same commit as the payment
    /// row and its new history entry.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` when `expected_version` is stale,
    /// `InvalidTransition`, `ReasonRequired`, plus the ledger errors of
    /// `record_payment`.
    pub async fn change_payment_status(
        &self,
        payment_id: PaymentId,
        expected_version: i64,
        change: PaymentStatusChange,
    ) -> BillingResult<RecordedPayment> {
        let change = &change;
        let recorded = self
            .retry
            .run_on_storage_faults("change_payment_status", move || async move {
                self.try_change_status(payment_id, expected_version, change)
                    .await
            })
            .await?;

        info!(
            payment_id = %payment_id,
            status = %recorded.payment.status,
            invoice_status = %recorded.invoice.status,
            balance = %recorded.invoice.balance_amount,
            "Payment status changed"
        );
        Ok(recorded)
    }

    async fn try_change_status(
        &self,
        payment_id: PaymentId,
        expected_version: i64,
        change: &PaymentStatusChange,
    ) -> BillingResult<RecordedPayment> {
        let now = Utc::now();
        let mut payment = self.store.get_payment(payment_id).await?;
        check_version(&payment, expected_version)?;
        let mut invoice = self.store.get_invoice(payment.invoice_id).await?;
        let invoice_version = invoice.version;

        let previous =
            payment.change_status(change.to, change.changed_by, change.reason.clone(), now)?;
        match (previous.counts_toward_invoice(), payment.status.counts_toward_invoice()) {
            (false, true) => {
                PaymentLedger::apply_payment(
                    &mut invoice,
                    payment.amount,
                    self.billing.overpayment_tolerance,
                    now,
                )?;
            }
            (true, false) => {
                PaymentLedger::reverse_payment(&mut invoice, payment.amount, now)?;
            }
            _ => {}
        }

        let receipt = self
            .store
            .commit(
                ChangeSet::new()
                    .update_payment(payment, expected_version)
                    .update_invoice(invoice, invoice_version),
            )
            .await?;
        into_recorded(receipt)
    }

    /// Attach file metadata to a payment.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict`, `InvalidAttachment`, `NotFound`.
    pub async fn add_payment_attachment(
        &self,
        payment_id: PaymentId,
        expected_version: i64,
        file_name: &str,
        content_type: &str,
        storage_key: &str,
        uploaded_by: UserId,
    ) -> BillingResult<Payment> {
        self.retry
            .run_on_storage_faults("add_payment_attachment", move || async move {
                let mut payment = self.store.get_payment(payment_id).await?;
                check_version(&payment, expected_version)?;
                payment.add_attachment(file_name, content_type, storage_key, uploaded_by, Utc::now())?;
                let payment = self.store.update_payment(payment, expected_version).await?;
                info!(
                    payment_id = %payment_id,
                    file_name,
                    attachments = payment.attachments.len(),
                    "Payment attachment added"
                );
                Ok::<_, BillingError>(payment)
            })
            .await
    }

    /// Status history of a payment, oldest first.
    pub async fn list_payment_history(
        &self,
        payment_id: PaymentId,
    ) -> BillingResult<Vec<PaymentStatusHistory>> {
        self.retry
            .run("list_payment_history", move || async move {
                let payment = self.store.get_payment(payment_id).await?;
                Ok::<_, BillingError>(payment.history().to_vec())
            })
            .await
    }

    /// Payments recorded against an invoice, oldest first.
    pub async fn list_payments(&self, invoice_id: InvoiceId) -> BillingResult<Vec<Payment>> {
        self.retry
            .run("list_payments", move || async move {
                Ok::<_, BillingError>(self.store.list_payments_by_invoice(invoice_id).await?)
            })
            .await
    }

    /// Credit individual invoice lines.
    ///
    /// # Errors
    ///
    /// * `ReasonRequired` - blank reason
    /// * `InvoiceNotCreditable` - invoice is Draft or Void
    /// * `InvalidCreditAmount` - a line is credited beyond what remains on it
    /// * `CreditExceedsBalance` - the note is larger than the open balance
    pub async fn issue_credit_note(
        &self,
        command: IssueCreditNoteCommand,
    ) -> BillingResult<IssuedCreditNote> {
        if command.reason.trim().is_empty() {
            return Err(PaymentError::ReasonRequired.into());
        }
        let command = &command;
        let issued = self
            .retry
            .run("issue_credit_note", move || async move {
                self.try_issue_credit_note(command).await
            })
            .await?;

        info!(
            credit_note_id = %issued.credit_note.id,
            credit_note_number = %issued.credit_note.credit_note_number,
            invoice_id = %issued.invoice.id,
            amount = %issued.credit_note.total_amount,
            invoice_status = %issued.invoice.status,
            "Credit note issued"
        );
        Ok(issued)
    }

    async fn try_issue_credit_note(
        &self,
        command: &IssueCreditNoteCommand,
    ) -> BillingResult<IssuedCreditNote> {
        let now = Utc::now();
        let mut invoice = self.store.get_invoice(command.invoice_id).await?;
        let read_version = invoice.version;

        let (lines, _) = PaymentLedger::apply_credit(&mut invoice, &command.lines, now)?;
        let sequence = self.store.next_value(SequenceKind::CreditNote).await?;
        let credit_note = CreditNote::new(
            invoice.organization_id,
            invoice.id,
            self.billing.credit_note_number(sequence),
            command.credit_date,
            command.reason.trim().to_string(),
            lines,
            command.issued_by,
            now,
        );

        let mut receipt = self
            .store
            .commit(
                ChangeSet::new()
                    .update_invoice(invoice, read_version)
                    .insert_credit_note(credit_note),
            )
            .await?;
        match (receipt.credit_notes.pop(), receipt.invoices.pop()) {
            (Some(credit_note), Some(invoice)) => Ok(IssuedCreditNote {
                credit_note,
                invoice,
            }),
            _ => Err(incomplete_receipt()),
        }
    }
}

fn into_recorded(mut receipt: CommitReceipt) -> BillingResult<RecordedPayment> {
    match (receipt.payments.pop(), receipt.invoices.pop()) {
        (Some(payment), Some(invoice)) => Ok(RecordedPayment { payment, invoice }),
        _ => Err(incomplete_receipt()),
    }
}

fn incomplete_receipt() -> BillingError {
    BillingError::Integrity("commit receipt is missing a written row".to_string())
}
