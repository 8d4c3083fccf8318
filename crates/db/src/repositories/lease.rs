//! Lease inputs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use leasebill_core::lease::{Lease, LeaseBillingSetting, LeaseRecurringCharge};
use leasebill_shared::types::{LeaseId, OrganizationId};

use super::error::StoreResult;

/// Leases, their billing settings and recurring charge templates.
///
/// Billing only reads these; the write methods exist for seeding and for
/// whatever owns lease management.
#[async_trait]
pub trait LeaseRepository: Send + Sync {
    /// Get an active lease.
    async fn get_lease(&self, id: LeaseId) -> StoreResult<Lease>;

    /// Active leases of an organization, oldest first.
    async fn list_leases_by_org(&self, organization_id: OrganizationId) -> StoreResult<Vec<Lease>>;

    /// Returns true if an active lease with this id exists.
    async fn lease_exists(&self, id: LeaseId) -> StoreResult<bool>;

    /// The lease's billing setting, if one was configured.
    async fn get_billing_setting(&self, lease_id: LeaseId)
    -> StoreResult<Option<LeaseBillingSetting>>;

    /// Active recurring charge templates of a lease.
    async fn list_recurring_charges(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<Vec<LeaseRecurringCharge>>;

    /// Insert a lease.
    async fn add_lease(&self, lease: Lease) -> StoreResult<Lease>;

    /// Insert the billing setting; a lease has at most one.
    async fn add_billing_setting(
        &self,
        setting: LeaseBillingSetting,
    ) -> StoreResult<LeaseBillingSetting>;

    /// Insert a recurring charge template.
    async fn add_recurring_charge(
        &self,
        charge: LeaseRecurringCharge,
    ) -> StoreResult<LeaseRecurringCharge>;

    /// Soft-delete a lease. Later reads no longer see it.
    async fn delete_lease(&self, id: LeaseId, at: DateTime<Utc>) -> StoreResult<()>;
}
