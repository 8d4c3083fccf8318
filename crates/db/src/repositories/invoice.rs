//! Invoices.

use async_trait::async_trait;

use leasebill_core::invoice::{Invoice, InvoiceKind, InvoiceStatus};
use leasebill_shared::types::{InvoiceId, LeaseId, OrganizationId, StatementId};

use super::error::StoreResult;

/// Filter for `list_invoices_by_org`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceFilter {
    /// Only invoices in one of these statuses; empty means any.
    pub statuses: &'static [InvoiceStatus],
    /// Only invoices of this kind.
    pub kind: Option<InvoiceKind>,
}

impl InvoiceFilter {
    /// Invoices that may still fall overdue.
    pub const OPEN: Self = Self {
        statuses: &[InvoiceStatus::Issued, InvoiceStatus::PartiallyPaid],
        kind: None,
    };

    /// Returns true if `invoice` passes every set criterion.
    #[must_use]
    pub fn matches(&self, invoice: &Invoice) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&invoice.status))
            && self.kind.is_none_or(|k| invoice.kind == k)
    }
}

/// Invoices.
///
/// Adapters enforce two unique keys on insert: the invoice number, and at
/// most one non-void invoice per `(lease, kind, period)`.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Get an active invoice.
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Invoice>;

    /// Every active invoice of a lease (void ones included), oldest first.
    async fn list_invoices_by_lease(&self, lease_id: LeaseId) -> StoreResult<Vec<Invoice>>;

    /// Active invoices of an organization matching `filter`, oldest first.
    async fn list_invoices_by_org(
        &self,
        organization_id: OrganizationId,
        filter: InvoiceFilter,
    ) -> StoreResult<Vec<Invoice>>;

    /// Insert an invoice at the initial version.
    async fn add_invoice(&self, invoice: Invoice) -> StoreResult<Invoice>;

    /// Compare-and-swap update; returns the stored copy at its new version.
    async fn update_invoice(&self, invoice: Invoice, expected_version: i64) -> StoreResult<Invoice>;

    /// Returns true if a non-void invoice has a line billing the statement.
    async fn statement_is_billed(&self, statement_id: StatementId) -> StoreResult<bool>;
}
