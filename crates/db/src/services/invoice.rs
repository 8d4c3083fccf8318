//! Invoice generation and status commands.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use leasebill_core::concurrency::check_version;
use leasebill_core::invoice::{
    BuildOutcome, BuildRequest, Invoice, InvoiceBuilder, InvoiceError, InvoiceKind,
    InvoiceStatus, ManualAdjustment,
};
use leasebill_core::{BillingError, BillingPeriod, BillingResult};
use leasebill_shared::config::{AppConfig, BillingConfig};
use leasebill_shared::types::{InvoiceId, LeaseId, OrganizationId};

use crate::repositories::{BillingStore, InvoiceFilter, SequenceKind};
use crate::retry::RetryPolicy;

/// Input for `InvoiceService::generate_invoice`.
#[derive(Debug, Clone)]
pub struct GenerateInvoiceCommand {
    /// Lease to bill.
    pub lease_id: LeaseId,
    /// Regular or utility invoice.
    pub kind: InvoiceKind,
    /// First day of the period. Without it the billing cycle around
    /// `period_end` (or today) is used.
    pub period_start: Option<NaiveDate>,
    /// Last day of the period. Defaults to one month after `period_start`
    /// minus a day.
    pub period_end: Option<NaiveDate>,
    /// Document date. Defaults to today.
    pub invoice_date: Option<NaiveDate>,
    /// One-off lines.
    pub adjustments: Vec<ManualAdjustment>,
}

impl GenerateInvoiceCommand {
    /// Regular invoice for the current billing cycle.
    #[must_use]
    pub fn regular(lease_id: LeaseId) -> Self {
        Self {
            lease_id,
            kind: InvoiceKind::Regular,
            period_start: None,
            period_end: None,
            invoice_date: None,
            adjustments: Vec::new(),
        }
    }

    /// Sets an explicit period.
    #[must_use]
    pub fn for_period(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.period_start = Some(start);
        self.period_end = end;
        self
    }

    /// Sets the document date.
    #[must_use]
    pub fn dated(mut self, invoice_date: NaiveDate) -> Self {
        self.invoice_date = Some(invoice_date);
        self
    }

    /// Adds a one-off line.
    #[must_use]
    pub fn with_adjustment(mut self, adjustment: ManualAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }
}

/// Result of `generate_invoice`.
#[derive(Debug, Clone)]
pub struct GeneratedInvoice {
    /// The Draft invoice for the lease and period.
    pub invoice: Invoice,
    /// False when an existing Draft was returned instead of a new one.
    pub created: bool,
}

/// Result of `mark_overdue`.
#[derive(Debug, Clone, Default)]
pub struct OverdueResult {
    /// Invoices moved to Overdue.
    pub marked: Vec<InvoiceId>,
    /// Invoices that could not be updated, with the error code.
    pub failed: Vec<(InvoiceId, String)>,
}

/// Invoice commands.
pub struct InvoiceService<S> {
    store: Arc<S>,
    billing: BillingConfig,
    retry: RetryPolicy,
}

impl<S> Clone for InvoiceService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            billing: self.billing.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: BillingStore> InvoiceService<S> {
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

    /// Generate (or return the existing Draft) invoice for one lease and period.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the lease does not exist
    /// * `MissingBillingSettings` - the lease has no billing setting
    /// * `DuplicateInvoice` - an issued invoice already covers the period
    /// * `NothingToInvoice` / `LeaseNotBillable` / `NegativeInvoiceTotal`
    /// * `Infrastructure` - the store stayed unavailable through every retry
    pub async fn generate_invoice(
        &self,
        command: GenerateInvoiceCommand,
    ) -> BillingResult<GeneratedInvoice> {
        let today = Utc::now().date_naive();
        let period = self.resolve_period(&command, today).await?;
        let invoice_date = command.invoice_date.unwrap_or(today);

        self.generate_for_period(
            command.lease_id,
            command.kind,
            period,
            invoice_date,
            &command.adjustments,
        )
        .await
    }

    /// Unit of work shared by single generation and invoice runs.
    pub(crate) async fn generate_for_period(
        &self,
        lease_id: LeaseId,
        kind: InvoiceKind,
        period: BillingPeriod,
        invoice_date: NaiveDate,
        adjustments: &[ManualAdjustment],
    ) -> BillingResult<GeneratedInvoice> {
        self.retry
            .run("generate_invoice", move || async move {
                self.try_generate(lease_id, kind, period, invoice_date, adjustments)
                    .await
            })
            .await
    }

    async fn try_generate(
        &self,
        lease_id: LeaseId,
        kind: InvoiceKind,
        period: BillingPeriod,
        invoice_date: NaiveDate,
        adjustments: &[ManualAdjustment],
    ) -> BillingResult<GeneratedInvoice> {
        let lease = self.store.get_lease(lease_id).await?;
        let settings = self.store.get_billing_setting(lease_id).await?;
        let recurring_charges = match kind {
            InvoiceKind::Regular => self.store.list_recurring_charges(lease_id).await?,
            InvoiceKind::Utility => Vec::new(),
        };
        let statements = self.store.list_statements_by_lease(lease_id).await?;
        let existing_invoices = self.store.list_invoices_by_lease(lease_id).await?;

        let request = BuildRequest {
            lease: &lease,
            settings: settings.as_ref(),
            kind,
            period,
            invoice_date,
            recurring_charges: &recurring_charges,
            statements: &statements,
            adjustments,
            existing_invoices: &existing_invoices,
            default_payment_term_days: self.billing.default_payment_term_days,
        };

        match InvoiceBuilder::build(&request)? {
            BuildOutcome::Existing(invoice) => {
                debug!(
                    lease_id = %lease_id,
                    invoice_id = %invoice.id,
                    period = %period,
                    "Draft invoice already exists"
                );
                Ok(GeneratedInvoice {
                    invoice,
                    created: false,
                })
            }
            BuildOutcome::New(draft) => {
                let sequence = self.store.next_value(SequenceKind::Invoice).await?;
                let invoice = draft.into_invoice(self.billing.invoice_number(sequence), Utc::now());
                let invoice = self.store.add_invoice(invoice).await?;
                info!(
                    lease_id = %lease_id,
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    kind = %kind,
                    period = %period,
                    total = %invoice.total_amount,
                    "Invoice generated"
                );
                Ok(GeneratedInvoice {
                    invoice,
                    created: true,
                })
            }
        }
    }

    async fn resolve_period(
        &self,
        command: &GenerateInvoiceCommand,
        today: NaiveDate,
    ) -> BillingResult<BillingPeriod> {
        match (command.period_start, command.period_end) {
            (Some(start), Some(end)) => Ok(BillingPeriod::new(start, end)?),
            (Some(start), None) => Ok(BillingPeriod::monthly_from(start)?),
            (None, end) => {
                let lease_id = command.lease_id;
                let settings = self
                    .retry
                    .run("resolve_billing_cycle", move || async move {
                        self.store.get_lease(lease_id).await?;
                        Ok::<_, BillingError>(self.store.get_billing_setting(lease_id).await?)
                    })
                    .await?
                    .ok_or(InvoiceError::MissingBillingSettings(lease_id))?;
                Ok(BillingPeriod::containing(
                    settings.billing_day,
                    end.unwrap_or(today),
                )?)
            }
        }
    }

    /// Get an invoice.
    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> BillingResult<Invoice> {
        self.retry
            .run("get_invoice", move || async move {
                Ok::<_, BillingError>(self.store.get_invoice(invoice_id).await?)
            })
            .await
    }

    /// Draft → Issued.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` when `expected_version` is stale, `EmptyInvoice`,
    /// `InvalidTransition` unless Draft.
    pub async fn issue_invoice(
        &self,
        invoice_id: InvoiceId,
        expected_version: i64,
    ) -> BillingResult<Invoice> {
        self.retry
            .run_on_storage_faults("issue_invoice", move || async move {
                let mut invoice = self.store.get_invoice(invoice_id).await?;
                check_version(&invoice, expected_version)?;
                invoice.issue(Utc::now())?;
                let invoice = self.store.update_invoice(invoice, expected_version).await?;
                info!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    total = %invoice.total_amount,
                    "Invoice issued"
                );
                Ok::<_, BillingError>(invoice)
            })
            .await
    }

    /// Void an invoice that has not collected any money.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict`, `VoidReasonRequired`, `HasPayments`,
    /// `InvalidTransition`.
    pub async fn void_invoice(
        &self,
        invoice_id: InvoiceId,
        expected_version: i64,
        reason: &str,
    ) -> BillingResult<Invoice> {
        self.retry
            .run_on_storage_faults("void_invoice", move || async move {
                let mut invoice = self.store.get_invoice(invoice_id).await?;
                check_version(&invoice, expected_version)?;
                invoice.void(reason, Utc::now())?;
                let invoice = self.store.update_invoice(invoice, expected_version).await?;
                info!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    reason = reason,
                    "Invoice voided"
                );
                Ok::<_, BillingError>(invoice)
            })
            .await
    }

    /// Move every Issued or PartiallyPaid invoice of the organization whose
    /// due date is before `as_of` to Overdue.
    ///
    /// Each invoice is its own unit of work; invoices that keep failing are
    /// reported, not raised.
    ///
    /// # Errors
    ///
    /// Only when the candidate list itself cannot be read.
    pub async fn mark_overdue(
        &self,
        organization_id: OrganizationId,
        as_of: NaiveDate,
    ) -> BillingResult<OverdueResult> {
        let candidates = self
            .retry
            .run("list_open_invoices", move || async move {
                Ok::<_, BillingError>(
                    self.store
                        .list_invoices_by_org(organization_id, InvoiceFilter::OPEN)
                        .await?,
                )
            })
            .await?;

        let mut result = OverdueResult::default();
        for candidate in candidates.iter().filter(|i| i.is_overdue_on(as_of)) {
            let invoice_id = candidate.id;
            match self.mark_one_overdue(invoice_id, as_of).await {
                Ok(true) => result.marked.push(invoice_id),
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        invoice_id = %invoice_id,
                        error_code = err.error_code(),
                        error = %err,
                        "Failed to mark invoice overdue"
                    );
                    result.failed.push((invoice_id, err.error_code().to_string()));
                }
            }
        }

        info!(
            organization_id = %organization_id,
            as_of = %as_of,
            marked = result.marked.len(),
            failed = result.failed.len(),
            "Overdue marking finished"
        );
        Ok(result)
    }

    /// Re-reads the invoice so a payment that landed meanwhile wins.
    async fn mark_one_overdue(&self, invoice_id: InvoiceId, as_of: NaiveDate) -> BillingResult<bool> {
        self.retry
            .run("mark_overdue", move || async move {
                let mut invoice = self.store.get_invoice(invoice_id).await?;
                if !invoice.is_overdue_on(as_of) {
                    return Ok(false);
                }
                let version = invoice.version;
                invoice.transition_to(InvoiceStatus::Overdue, Utc::now())?;
                self.store.update_invoice(invoice, version).await?;
                Ok::<_, BillingError>(true)
            })
            .await
    }
}
