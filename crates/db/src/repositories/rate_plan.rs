//! Rate plan catalog.

use async_trait::async_trait;

use leasebill_core::rating::{UtilityRatePlan, UtilityType};
use leasebill_shared::types::OrganizationId;

use super::error::StoreResult;

/// Utility rate plans. Read fresh for every statement finalization.
#[async_trait]
pub trait RatePlanRepository: Send + Sync {
    /// Active plans of an organization for one utility, in any effective window.
    async fn list_rate_plans(
        &self,
        organization_id: OrganizationId,
        utility_type: UtilityType,
    ) -> StoreResult<Vec<UtilityRatePlan>>;

    /// Insert a plan.
    async fn add_rate_plan(&self, plan: UtilityRatePlan) -> StoreResult<UtilityRatePlan>;
}
