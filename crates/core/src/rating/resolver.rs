//! Rate plan selection and slab validation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;

use leasebill_shared::types::OrganizationId;

use super::error::RatingError;
use super::types::{ResolvedRatePlan, UtilityRatePlan, UtilityRateSlab, UtilityType};

/// Stateless plan resolution service.
pub struct RatePlanResolver;

impl RatePlanResolver {
    /// Select the single plan in force for an organization, utility and date.
    ///
    /// Soft-deleted and inactive plans are ignored. The chosen plan's slabs
    /// are validated and returned sorted by `slab_order`.
    ///
    /// # Arguments
    ///
    /// * `plans` - Candidate plans (usually every plan of the organization)
    /// * `organization_id` - Owning organization
    /// * `utility_type` - Utility being priced
    /// * `date` - Effective date, normally the statement's period end
    ///
    /// # Errors
    ///
    /// `NoRatePlan` when nothing matches, `AmbiguousRatePlan` when more than
    /// one plan matches, or any slab validation error.
    pub fn resolve(
        plans: &[UtilityRatePlan],
        organization_id: OrganizationId,
        utility_type: UtilityType,
        date: NaiveDate,
    ) -> Result<ResolvedRatePlan, RatingError> {
        let candidates: Vec<&UtilityRatePlan> = plans
            .iter()
            .filter(|p| {
                p.deleted_at.is_none()
                    && p.organization_id == organization_id
                    && p.utility_type == utility_type
                    && p.is_effective_on(date)
            })
            .collect();

        let plan = match candidates.as_slice() {
            [] => return Err(RatingError::NoRatePlan { utility_type, date }),
            [plan] => *plan,
            many => {
                return Err(RatingError::AmbiguousRatePlan {
                    utility_type,
                    date,
                    count: many.len(),
                });
            }
        };

        if plan.slabs.is_empty() {
            return Err(RatingError::EmptyRatePlan(plan.id));
        }

        let mut slabs = plan.slabs.clone();
        slabs.sort_by_key(|s| s.slab_order);
        Self::validate_slabs(&slabs)?;

        Ok(ResolvedRatePlan {
            plan_id: plan.id,
            name: plan.name.clone(),
            fixed_charge_on_zero_usage: plan.fixed_charge_on_zero_usage,
            tax_rate: plan.tax_rate,
            slabs,
        })
    }

    /// Validate a slab list already sorted by `slab_order`.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: empty list, duplicate order,
    /// negative rate or fixed charge, empty range, first slab above zero,
    /// gap, overlap, or an open-ended slab that is not last.
    pub fn validate_slabs(slabs: &[UtilityRateSlab]) -> Result<(), RatingError> {
        let Some(first) = slabs.first() else {
            return Err(RatingError::NoSlabs);
        };

        let mut seen = HashSet::with_capacity(slabs.len());
        for slab in slabs {
            if !seen.insert(slab.slab_order) {
                return Err(RatingError::DuplicateSlabOrder(slab.slab_order));
            }
            if slab.rate_per_unit < Decimal::ZERO
                || slab.fixed_charge.is_some_and(|f| f < Decimal::ZERO)
            {
                return Err(RatingError::NegativeRate {
                    slab_order: slab.slab_order,
                });
            }
            if slab.to_units.is_some_and(|to| to <= slab.from_units) {
                return Err(RatingError::InvalidSlabRange {
                    slab_order: slab.slab_order,
                });
            }
        }

        if !first.from_units.is_zero() {
            return Err(RatingError::FirstSlabNotAtZero(first.from_units));
        }

        for pair in slabs.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let Some(expected) = prev.to_units else {
                return Err(RatingError::OpenSlabNotLast {
                    slab_order: prev.slab_order,
                });
            };
            if next.from_units > expected {
                return Err(RatingError::SlabGap {
                    slab_order: next.slab_order,
                    expected,
                    found: next.from_units,
                });
            }
            if next.from_units < expected {
                return Err(RatingError::SlabOverlap {
                    slab_order: next.slab_order,
                    expected,
                    found: next.from_units,
                });
            }
        }

        Ok(())
    }
}
