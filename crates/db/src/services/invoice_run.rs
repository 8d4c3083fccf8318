//! Batch invoice runs.
//!
//! A run walks the organization's eligible leases and generates one invoice
//! per lease. Every lease is an independent unit of work: a lease that fails
//! for a business reason becomes a failed run item and the run moves on;
//! invoices already committed for earlier leases stay. Only a storage fault
//! that outlives the retry policy stops the run, which is then marked Failed.
//! A lease whose stored billing day cannot produce a period fails alone.
//!
//! The run row is rewritten after every item so `get_run` shows progress.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use leasebill_core::invoice::InvoiceKind;
use leasebill_core::invoice_run::{InvoiceRun, InvoiceRunError, InvoiceRunKind};
use leasebill_core::lease::{Lease, LeaseBillingSetting};
use leasebill_core::statement::StatementStatus;
use leasebill_core::{BillingError, BillingPeriod, BillingResult, ErrorKind, PeriodError};
use leasebill_shared::config::AppConfig;
use leasebill_shared::types::{InvoiceId, InvoiceRunId, LeaseId, OrganizationId};

use super::invoice::InvoiceService;
use crate::repositories::{BillingStore, StatementFilter};
use crate::retry::RetryPolicy;

/// Input for `InvoiceRunService::create_invoice_run`.
#[derive(Debug, Clone, Copy)]
pub struct CreateInvoiceRunCommand {
    /// Organization billed.
    pub organization_id: OrganizationId,
    /// Monthly or utility run.
    pub kind: InvoiceRunKind,
    /// First day of the run window.
    pub period_start: NaiveDate,
    /// Last day of the run window. Required for utility runs; monthly runs
    /// default to one month after `period_start` minus a day.
    pub period_end: Option<NaiveDate>,
}

/// A lease selected for a run.
#[derive(Debug, Clone)]
struct RunTarget {
    lease_id: LeaseId,
    kind: InvoiceKind,
    /// Period billed and invoice date, or why none could be derived.
    schedule: Result<(BillingPeriod, NaiveDate), PeriodError>,
}

/// What happened to one lease.
enum LeaseOutcome {
    Invoiced {
        lease_id: LeaseId,
        invoice_id: InvoiceId,
    },
    Failed {
        lease_id: LeaseId,
        error: BillingError,
    },
    /// A storage fault survived the retries; the run must stop.
    Aborted {
        lease_id: LeaseId,
        error: BillingError,
    },
}

/// Orchestrates invoice runs.
pub struct InvoiceRunService<S> {
    store: Arc<S>,
    invoices: InvoiceService<S>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl<S: BillingStore> InvoiceRunService<S> {
    /// Creates the service.
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            invoices: InvoiceService::new(Arc::clone(&store), config),
            store,
            retry: RetryPolicy::from_config(&config.retry),
            max_concurrency: config.run.max_concurrency.max(1),
        }
    }

    /// Replaces the retry policy, for the run row and every lease.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.invoices = self.invoices.with_retry(retry.clone());
        self.retry = retry;
        self
    }

    /// Get a run, e.g. to poll progress.
    pub async fn get_run(&self, run_id: InvoiceRunId) -> BillingResult<InvoiceRun> {
        self.retry
            .run("get_invoice_run", move || async move {
                Ok::<_, BillingError>(self.store.get_run(run_id).await?)
            })
            .await
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Invalid input (`PeriodEndRequired`, inverted window) or a store that
    /// cannot persist the run row. Lease failures are run items, not errors.
    pub async fn create_invoice_run(
        &self,
        command: CreateInvoiceRunCommand,
    ) -> BillingResult<InvoiceRun> {
        self.create_invoice_run_with_cancel(command, CancellationToken::new())
            .await
    }

    /// Run until done or until `cancel` fires.
    ///
    /// After cancellation no further lease is started; leases already in
    /// flight finish and are recorded, and the run ends Cancelled.
    pub async fn create_invoice_run_with_cancel(
        &self,
        command: CreateInvoiceRunCommand,
        cancel: CancellationToken,
    ) -> BillingResult<InvoiceRun> {
        let window = run_window(&command)?;
        let organization_id = command.organization_id;

        let run = InvoiceRun::new(organization_id, command.kind, window, Utc::now());
        let mut run = self
            .retry
            .run("create_invoice_run", || {
                let run = run.clone();
                async move { Ok::<_, BillingError>(self.store.add_run(run).await?) }
            })
            .await?;

        info!(
            run_id = %run.id,
            organization_id = %organization_id,
            kind = %run.kind,
            period = %window,
            "Invoice run created"
        );

        if cancel.is_cancelled() {
            run.cancel(Utc::now())?;
            let run = self.save_run(run).await?;
            info!(run_id = %run.id, "Invoice run cancelled before start");
            return Ok(run);
        }

        let targets = match self.select_targets(&run).await {
            Ok(targets) => targets,
            Err(error) => return self.abort_unstarted(run, error).await,
        };
        let total = u32::try_from(targets.len()).unwrap_or(u32::MAX);
        run.start(total, Utc::now())?;
        let mut run = self.save_run(run).await?;
        info!(run_id = %run.id, total_leases = total, "Invoice run started");

        let stop = cancel.child_token();
        let mut outcomes = std::pin::pin!(
            stream::iter(targets)
                .take_until(stop.cancelled())
                .map(|target| self.process_lease(target))
                .buffer_unordered(self.max_concurrency)
        );

        let mut abort_reason = None;
        while let Some(outcome) = outcomes.next().await {
            let now = Utc::now();
            match outcome {
                LeaseOutcome::Invoiced {
                    lease_id,
                    invoice_id,
                } => run.record_success(lease_id, invoice_id, now)?,
                LeaseOutcome::Failed { lease_id, error } => {
                    warn!(
                        run_id = %run.id,
                        lease_id = %lease_id,
                        error_code = error.error_code(),
                        error = %error,
                        "Lease failed in invoice run"
                    );
                    run.record_failure(lease_id, error.error_code(), &error.to_string(), now)?;
                }
                LeaseOutcome::Aborted { lease_id, error } => {
                    error!(
                        run_id = %run.id,
                        lease_id = %lease_id,
                        error = %error,
                        "Storage fault outlived retries, aborting invoice run"
                    );
                    run.record_failure(lease_id, error.error_code(), &error.to_string(), now)?;
                    if abort_reason.is_none() {
                        abort_reason = Some(format!("lease {lease_id}: {error}"));
                    }
                    stop.cancel();
                }
            }
            run = self.save_run(run).await?;
        }

        let now = Utc::now();
        if let Some(reason) = abort_reason {
            run.fail(&reason, now)?;
        } else if run.processed_count() < run.total_leases {
            run.cancel(now)?;
        } else {
            run.complete(now)?;
        }
        let run = self.save_run(run).await?;

        info!(
            run_id = %run.id,
            status = %run.status,
            total_leases = run.total_leases,
            success_count = run.success_count,
            failure_count = run.failure_count,
            "Invoice run finished"
        );
        Ok(run)
    }

    /// Eligible leases in id order, read fresh for this run.
    async fn select_targets(&self, run: &InvoiceRun) -> BillingResult<Vec<RunTarget>> {
        let organization_id = run.organization_id;
        let window = run.period;
        let kind = run.kind;
        self.retry
            .run("select_run_leases", move || async move {
                let leases: Vec<Lease> = self
                    .store
                    .list_leases_by_org(organization_id)
                    .await?
                    .into_iter()
                    .filter(|l| l.is_billable_in(&window))
                    .collect();

                let mut targets = Vec::with_capacity(leases.len());
                match kind {
                    InvoiceRunKind::Monthly => {
                        for lease in leases {
                            let settings = self.store.get_billing_setting(lease.id).await?;
                            targets.extend(monthly_target(&lease, settings.as_ref(), window));
                        }
                    }
                    InvoiceRunKind::Utility => {
                        let filter = StatementFilter {
                            status: Some(StatementStatus::Finalized),
                            period_end_from: Some(window.start),
                            period_end_to: Some(window.end),
                        };
                        let statements = self
                            .store
                            .list_statements_by_org(organization_id, filter)
                            .await?;
                        for lease in leases {
                            if statements.iter().any(|s| s.lease_id == lease.id) {
                                targets.push(RunTarget {
                                    lease_id: lease.id,
                                    kind: InvoiceKind::Utility,
                                    schedule: Ok((window, window.end)),
                                });
                            }
                        }
                    }
                }
                Ok::<_, BillingError>(targets)
            })
            .await
    }

    /// Marks a run that never got its lease list as Failed.
    ///
    /// Returns the stored run, or `error` if the run row cannot be saved
    /// either.
    async fn abort_unstarted(
        &self,
        mut run: InvoiceRun,
        error: BillingError,
    ) -> BillingResult<InvoiceRun> {
        error!(
            run_id = %run.id,
            error_code = error.error_code(),
            error = %error,
            "Could not select leases, aborting invoice run"
        );
        let now = Utc::now();
        run.start(0, now)?;
        run.fail(&format!("lease selection: {error}"), now)?;
        match self.save_run(run).await {
            Ok(run) => Ok(run),
            Err(save_error) => {
                warn!(error = %save_error, "Aborted invoice run could not be saved");
                Err(error)
            }
        }
    }

    async fn process_lease(&self, target: RunTarget) -> LeaseOutcome {
        let lease_id = target.lease_id;
        let (period, invoice_date) = match target.schedule {
            Ok(schedule) => schedule,
            Err(error) => {
                return LeaseOutcome::Failed {
                    lease_id,
                    error: error.into(),
                };
            }
        };
        match self
            .invoices
            .generate_for_period(lease_id, target.kind, period, invoice_date, &[])
            .await
        {
            Ok(generated) => LeaseOutcome::Invoiced {
                lease_id,
                invoice_id: generated.invoice.id,
            },
            Err(error) if error.kind() == ErrorKind::Infrastructure => {
                LeaseOutcome::Aborted { lease_id, error }
            }
            Err(error) => LeaseOutcome::Failed { lease_id, error },
        }
    }

    /// Versioned write of the run row.
    async fn save_run(&self, run: InvoiceRun) -> BillingResult<InvoiceRun> {
        let expected_version = run.version;
        self.retry
            .run_on_storage_faults("save_invoice_run", || {
                let run = run.clone();
                async move {
                    Ok::<_, BillingError>(self.store.update_run(run, expected_version).await?)
                }
            })
            .await
    }
}

/// Monthly target for one lease, `None` when the lease is not billed this run.
///
/// A lease without settings is still attempted so the run reports the
/// missing setting. A lease whose billing-day period falls outside its term
/// is skipped.
fn monthly_target(
    lease: &Lease,
    settings: Option<&LeaseBillingSetting>,
    window: BillingPeriod,
) -> Option<RunTarget> {
    let schedule = match settings {
        Some(s) if !s.auto_generate => return None,
        Some(s) => match BillingPeriod::first_on_or_after(s.billing_day, window.start) {
            Ok(period) if !lease.is_billable_in(&period) => return None,
            Ok(period) => Ok((period, period.start)),
            Err(error) => Err(error),
        },
        None => Ok((window, window.start)),
    };
    Some(RunTarget {
        lease_id: lease.id,
        kind: InvoiceKind::Regular,
        schedule,
    })
}

/// Validates the command and derives the run window.
fn run_window(command: &CreateInvoiceRunCommand) -> BillingResult<BillingPeriod> {
    let period = match (command.kind, command.period_end) {
        (_, Some(end)) => BillingPeriod::new(command.period_start, end)?,
        (InvoiceRunKind::Monthly, None) => BillingPeriod::monthly_from(command.period_start)?,
        (InvoiceRunKind::Utility, None) => return Err(InvoiceRunError::PeriodEndRequired.into()),
    };
    Ok(period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasebill_core::lease::LeaseStatus;
    use leasebill_core::proration::ProrationMethod;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn command(kind: InvoiceRunKind, end: Option<NaiveDate>) -> CreateInvoiceRunCommand {
        CreateInvoiceRunCommand {
            organization_id: OrganizationId::new(),
            kind,
            period_start: date(2026, 4, 1),
            period_end: end,
        }
    }

    fn lease(start: NaiveDate, end: Option<NaiveDate>) -> Lease {
        Lease {
            id: LeaseId::new(),
            organization_id: OrganizationId::new(),
            unit_ref: "A-101".to_string(),
            tenant_ref: "T-1".to_string(),
            start_date: start,
            end_date: end,
            status: LeaseStatus::Active,
            deleted_at: None,
        }
    }

    fn billed_on(lease: &Lease, billing_day: u32) -> LeaseBillingSetting {
        LeaseBillingSetting {
            lease_id: lease.id,
            billing_day,
            payment_term_days: None,
            proration_method: ProrationMethod::ActualDaysInMonth,
            auto_generate: true,
        }
    }

    fn april() -> BillingPeriod {
        BillingPeriod::monthly_from(date(2026, 4, 1)).unwrap()
    }

    #[test]
    fn test_bad_billing_day_becomes_a_lease_failure() {
        let lease = lease(date(2026, 1, 1), None);
        let target = monthly_target(&lease, Some(&billed_on(&lease, 30)), april()).unwrap();

        assert_eq!(target.lease_id, lease.id);
        assert_eq!(target.schedule, Err(PeriodError::InvalidBillingDay(30)));
    }

    #[test]
    fn test_monthly_target_uses_billing_day_period() {
        let lease = lease(date(2026, 1, 1), None);
        let target = monthly_target(&lease, Some(&billed_on(&lease, 15)), april()).unwrap();

        let (period, invoice_date) = target.schedule.unwrap();
        assert_eq!(period.start, date(2026, 4, 15));
        assert_eq!(period.end, date(2026, 5, 14));
        assert_eq!(invoice_date, date(2026, 4, 15));
    }

    #[test]
    fn test_lease_ended_before_its_period_is_skipped() {
        let ended = lease(date(2026, 1, 1), Some(date(2026, 4, 10)));
        assert!(monthly_target(&ended, Some(&billed_on(&ended, 15)), april()).is_none());

        let unconfigured = lease(date(2026, 1, 1), None);
        let target = monthly_target(&unconfigured, None, april()).unwrap();
        assert_eq!(target.schedule, Ok((april(), date(2026, 4, 1))));
    }

    #[test]
    fn test_monthly_window_defaults_to_one_month() {
        let window = run_window(&command(InvoiceRunKind::Monthly, None)).unwrap();
        assert_eq!(window.end, date(2026, 4, 30));
    }

    #[test]
    fn test_utility_window_needs_an_end() {
        let err = run_window(&command(InvoiceRunKind::Utility, None)).unwrap_err();
        assert_eq!(err.error_code(), "PERIOD_END_REQUIRED");

        let window =
            run_window(&command(InvoiceRunKind::Utility, Some(date(2026, 4, 15)))).unwrap();
        assert_eq!(window.days(), 15);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err =
            run_window(&command(InvoiceRunKind::Monthly, Some(date(2026, 3, 1)))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
