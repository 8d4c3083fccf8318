//! Utility statements.

use async_trait::async_trait;
use chrono::NaiveDate;

use leasebill_core::statement::{StatementStatus, UtilityStatement};
use leasebill_shared::types::{LeaseId, OrganizationId, StatementId};

use super::error::StoreResult;

/// Filter for `list_statements_by_org`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementFilter {
    /// Only statements in this status.
    pub status: Option<StatementStatus>,
    /// Only statements whose period ends on or after this date.
    pub period_end_from: Option<NaiveDate>,
    /// Only statements whose period ends on or before this date.
    pub period_end_to: Option<NaiveDate>,
}

impl StatementFilter {
    /// Returns true if `statement` passes every set criterion.
    #[must_use]
    pub fn matches(&self, statement: &UtilityStatement) -> bool {
        self.status.is_none_or(|s| statement.status == s)
            && self
                .period_end_from
                .is_none_or(|from| statement.period.end >= from)
            && self.period_end_to.is_none_or(|to| statement.period.end <= to)
    }
}

/// Utility statements.
#[async_trait]
pub trait StatementRepository: Send + Sync {
    /// Get an active statement.
    async fn get_statement(&self, id: StatementId) -> StoreResult<UtilityStatement>;

    /// Active statements of a lease, oldest first.
    async fn list_statements_by_lease(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<Vec<UtilityStatement>>;

    /// Active statements of an organization matching `filter`, oldest first.
    async fn list_statements_by_org(
        &self,
        organization_id: OrganizationId,
        filter: StatementFilter,
    ) -> StoreResult<Vec<UtilityStatement>>;

    /// Insert a statement at the initial version.
    async fn add_statement(&self, statement: UtilityStatement) -> StoreResult<UtilityStatement>;

    /// Compare-and-swap update; returns the stored copy at its new version.
    async fn update_statement(
        &self,
        statement: UtilityStatement,
        expected_version: i64,
    ) -> StoreResult<UtilityStatement>;
}
