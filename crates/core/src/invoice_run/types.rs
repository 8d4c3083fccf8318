//! Invoice run aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{InvoiceId, InvoiceRunId, LeaseId, OrganizationId};

use super::error::InvoiceRunError;
use crate::concurrency::{INITIAL_VERSION, Versioned};
use crate::period::BillingPeriod;

/// Which invoices a run generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceRunKind {
    /// One regular invoice per lease, period taken from its billing day.
    Monthly,
    /// One utility invoice per lease with finalized statements in the window.
    Utility,
}

impl InvoiceRunKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Utility => "utility",
        }
    }
}

impl fmt::Display for InvoiceRunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice run status.
///
/// The valid transitions are:
/// - Pending → Running | Cancelled
/// - Running → Completed | Failed | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceRunStatus {
    /// Created, not started.
    Pending,
    /// Processing leases.
    Running,
    /// Every eligible lease was attempted.
    Completed,
    /// Aborted by an infrastructure fault.
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl InvoiceRunStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }

    /// Returns true once the run can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for InvoiceRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome for one lease in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRunItem {
    /// Lease attempted.
    pub lease_id: LeaseId,
    /// Whether an invoice was produced.
    pub is_success: bool,
    /// Invoice produced (or returned idempotently) on success.
    pub invoice_id: Option<InvoiceId>,
    /// Machine-readable failure code.
    pub error_code: Option<String>,
    /// Human-readable failure message.
    pub error_message: Option<String>,
    /// When the attempt finished.
    pub processed_at: DateTime<Utc>,
}

/// Batch invoice run aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRun {
    /// Unique identifier.
    pub id: InvoiceRunId,
    /// Organization billed.
    pub organization_id: OrganizationId,
    /// Monthly or utility.
    pub kind: InvoiceRunKind,
    /// Run window.
    pub period: BillingPeriod,
    /// Lifecycle status.
    pub status: InvoiceRunStatus,
    /// Eligible leases found when the run started.
    pub total_leases: u32,
    /// Leases invoiced.
    pub success_count: u32,
    /// Leases that failed.
    pub failure_count: u32,
    /// One entry per attempted lease.
    pub items: Vec<InvoiceRunItem>,
    /// When processing started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Why the run failed.
    pub abort_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Version token.
    pub version: i64,
}

impl InvoiceRun {
    /// Creates a Pending run.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        kind: InvoiceRunKind,
        period: BillingPeriod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceRunId::new(),
            organization_id,
            kind,
            period,
            status: InvoiceRunStatus::Pending,
            total_leases: 0,
            success_count: 0,
            failure_count: 0,
            items: Vec::new(),
            started_at: None,
            completed_at: None,
            abort_reason: None,
            created_at: now,
            updated_at: now,
            version: INITIAL_VERSION,
        }
    }

    /// Pending → Running with the number of eligible leases.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless Pending.
    pub fn start(&mut self, total_leases: u32, now: DateTime<Utc>) -> Result<(), InvoiceRunError> {
        self.transition_to(InvoiceRunStatus::Running, now)?;
        self.total_leases = total_leases;
        self.started_at = Some(now);
        Ok(())
    }

    /// Record a lease that produced an invoice.
    ///
    /// # Errors
    ///
    /// `NotRunning` or `DuplicateItem`.
    pub fn record_success(
        &mut self,
        lease_id: LeaseId,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceRunError> {
        self.push_item(InvoiceRunItem {
            lease_id,
            is_success: true,
            invoice_id: Some(invoice_id),
            error_code: None,
            error_message: None,
            processed_at: now,
        })?;
        self.success_count = self.success_count.saturating_add(1);
        Ok(())
    }

    /// Record a lease that failed.
    ///
    /// # Errors
    ///
    /// `NotRunning` or `DuplicateItem`.
    pub fn record_failure(
        &mut self,
        lease_id: LeaseId,
        error_code: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceRunError> {
        self.push_item(InvoiceRunItem {
            lease_id,
            is_success: false,
            invoice_id: None,
            error_code: Some(error_code.to_string()),
            error_message: Some(error_message.to_string()),
            processed_at: now,
        })?;
        self.failure_count = self.failure_count.saturating_add(1);
        Ok(())
    }

    /// Running → Completed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless Running.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), InvoiceRunError> {
        self.transition_to(InvoiceRunStatus::Completed, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running → Failed with a reason.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless Running.
    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), InvoiceRunError> {
        self.transition_to(InvoiceRunStatus::Failed, now)?;
        self.abort_reason = Some(reason.to_string());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Pending or Running → Cancelled.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from a terminal status.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), InvoiceRunError> {
        self.transition_to(InvoiceRunStatus::Cancelled, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Leases attempted so far.
    #[must_use]
    pub fn processed_count(&self) -> u32 {
        self.success_count.saturating_add(self.failure_count)
    }

    /// Returns true if the lease already has an item.
    #[must_use]
    pub fn has_item_for(&self, lease_id: LeaseId) -> bool {
        self.items.iter().any(|i| i.lease_id == lease_id)
    }

    /// `(lease, message)` for every failed item, in processing order.
    #[must_use]
    pub fn failure_reasons(&self) -> Vec<(LeaseId, String)> {
        self.items
            .iter()
            .filter(|i| !i.is_success)
            .map(|i| (i.lease_id, i.error_message.clone().unwrap_or_default()))
            .collect()
    }

    fn push_item(&mut self, item: InvoiceRunItem) -> Result<(), InvoiceRunError> {
        if self.status != InvoiceRunStatus::Running {
            return Err(InvoiceRunError::NotRunning {
                run_id: self.id,
                status: self.status,
            });
        }
        if self.has_item_for(item.lease_id) {
            return Err(InvoiceRunError::DuplicateItem {
                run_id: self.id,
                lease_id: item.lease_id,
            });
        }
        self.updated_at = item.processed_at;
        self.items.push(item);
        Ok(())
    }

    fn transition_to(
        &mut self,
        to: InvoiceRunStatus,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceRunError> {
        if !self.status.can_transition_to(to) {
            return Err(InvoiceRunError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

impl Versioned for InvoiceRun {
    const ENTITY: &'static str = "invoice_run";

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
