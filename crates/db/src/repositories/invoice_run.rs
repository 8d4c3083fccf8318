//! Invoice runs.

use async_trait::async_trait;

use leasebill_core::invoice_run::InvoiceRun;
use leasebill_shared::types::{InvoiceRunId, OrganizationId};

use super::error::StoreResult;

/// Invoice runs. The orchestrator rewrites the run row after every item.
#[async_trait]
pub trait InvoiceRunRepository: Send + Sync {
    /// Get a run.
    async fn get_run(&self, id: InvoiceRunId) -> StoreResult<InvoiceRun>;

    /// Runs of an organization, oldest first.
    async fn list_runs_by_org(&self, organization_id: OrganizationId)
    -> StoreResult<Vec<InvoiceRun>>;

    /// Insert a run at the initial version.
    async fn add_run(&self, run: InvoiceRun) -> StoreResult<InvoiceRun>;

    /// Compare-and-swap update; returns the stored copy at its new version.
    async fn update_run(&self, run: InvoiceRun, expected_version: i64) -> StoreResult<InvoiceRun>;
}
