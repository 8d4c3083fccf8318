//! Utility statement commands.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use leasebill_core::concurrency::check_version;
use leasebill_core::rating::{RatePlanResolver, UtilityType};
use leasebill_core::statement::{StatementError, UtilityStatement};
use leasebill_core::{BillingError, BillingPeriod, BillingResult};
use leasebill_shared::config::AppConfig;
use leasebill_shared::types::{LeaseId, StatementId};

use crate::repositories::BillingStore;
use crate::retry::RetryPolicy;

/// Input for `StatementService::create_statement`.
#[derive(Debug, Clone, Copy)]
pub struct CreateStatementCommand {
    /// Lease consuming the utility.
    pub lease_id: LeaseId,
    /// Utility measured.
    pub utility_type: UtilityType,
    /// First day of consumption.
    pub period_start: NaiveDate,
    /// Last day of consumption.
    pub period_end: NaiveDate,
    /// Tax rate for direct amounts; metered statements take the plan's rate.
    pub tax_rate: Decimal,
}

/// Utility statement commands.
pub struct StatementService<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: BillingStore> StatementService<S> {
    /// Creates the service.
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Open a Draft statement for a lease.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown lease, `InvalidPeriod` for an inverted range.
    pub async fn create_statement(
        &self,
        command: CreateStatementCommand,
    ) -> BillingResult<UtilityStatement> {
        let period = BillingPeriod::new(command.period_start, command.period_end)?;
        let statement = self
            .retry
            .run("create_statement", move || async move {
                let lease = self.store.get_lease(command.lease_id).await?;
                let statement = UtilityStatement::new(
                    lease.organization_id,
                    lease.id,
                    command.utility_type,
                    period,
                    command.tax_rate,
                    Utc::now(),
                );
                Ok::<_, BillingError>(self.store.add_statement(statement).await?)
            })
            .await?;

        info!(
            statement_id = %statement.id,
            lease_id = %statement.lease_id,
            utility = %statement.utility_type,
            period = %period,
            "Utility statement created"
        );
        Ok(statement)
    }

    /// Get a statement.
    pub async fn get_statement(&self, statement_id: StatementId) -> BillingResult<UtilityStatement> {
        self.retry
            .run("get_statement", move || async move {
                Ok::<_, BillingError>(self.store.get_statement(statement_id).await?)
            })
            .await
    }

    /// Record meter readings on a Draft statement.
    ///
    /// # Errors
    ///
    /// `Locked`, `NotEditable`, `NegativeReading`, `ReadingDecreased`,
    /// `ConcurrencyConflict`.
    pub async fn record_readings(
        &self,
        statement_id: StatementId,
        expected_version: i64,
        previous: Decimal,
        current: Decimal,
    ) -> BillingResult<UtilityStatement> {
        self.edit("record_readings", statement_id, expected_version, |s| {
            s.record_readings(previous, current, Utc::now())
        })
        .await
    }

    /// Record a direct bill amount on a Draft statement.
    ///
    /// # Errors
    ///
    /// `Locked`, `NotEditable`, `NegativeAmount`, `ConcurrencyConflict`.
    pub async fn set_direct_amount(
        &self,
        statement_id: StatementId,
        expected_version: i64,
        amount: Decimal,
    ) -> BillingResult<UtilityStatement> {
        self.edit("set_direct_amount", statement_id, expected_version, |s| {
            s.set_direct_amount(amount, Utc::now())
        })
        .await
    }

    /// Price and finalize a statement.
    ///
    /// Metered statements are priced against the single rate plan effective
    /// on the last day of the statement period; direct statements keep their
    /// entered amount.
    ///
    /// # Errors
    ///
    /// `MissingInput`, `NoRatePlan`, `AmbiguousRatePlan`, slab validation
    /// errors, `NotEditable`, `ConcurrencyConflict`.
    pub async fn finalize_statement(
        &self,
        statement_id: StatementId,
        expected_version: i64,
    ) -> BillingResult<UtilityStatement> {
        let statement = self
            .retry
            .run_on_storage_faults("finalize_statement", move || async move {
                let mut statement = self.load_editable(statement_id, expected_version).await?;
                let now = Utc::now();
                if statement.is_metered() {
                    let plans = self
                        .store
                        .list_rate_plans(statement.organization_id, statement.utility_type)
                        .await?;
                    let plan = RatePlanResolver::resolve(
                        &plans,
                        statement.organization_id,
                        statement.utility_type,
                        statement.period.end,
                    )?;
                    statement.finalize_metered(&plan, now)?;
                } else {
                    statement.finalize_direct(now)?;
                }
                Ok::<_, BillingError>(
                    self.store
                        .update_statement(statement, expected_version)
                        .await?,
                )
            })
            .await?;

        info!(
            statement_id = %statement.id,
            consumption = ?statement.consumption,
            amount = ?statement.calculated_amount,
            rate_plan_id = ?statement.rate_plan_id,
            "Utility statement finalized"
        );
        Ok(statement)
    }

    async fn edit<F>(
        &self,
        operation: &str,
        statement_id: StatementId,
        expected_version: i64,
        apply: F,
    ) -> BillingResult<UtilityStatement>
    where
        F: Fn(&mut UtilityStatement) -> Result<(), StatementError>,
    {
        let apply = &apply;
        let statement = self
            .retry
            .run_on_storage_faults(operation, move || async move {
                let mut statement = self.load_editable(statement_id, expected_version).await?;
                apply(&mut statement)?;
                Ok::<_, BillingError>(
                    self.store
                        .update_statement(statement, expected_version)
                        .await?,
                )
            })
            .await?;

        info!(statement_id = %statement_id, operation, "Utility statement updated");
        Ok(statement)
    }

    async fn load_editable(
        &self,
        statement_id: StatementId,
        expected_version: i64,
    ) -> BillingResult<UtilityStatement> {
        let statement = self.store.get_statement(statement_id).await?;
        check_version(&statement, expected_version)?;
        if self.store.statement_is_billed(statement_id).await? {
            return Err(StatementError::Locked(statement_id).into());
        }
        Ok(statement)
    }
}
