//! Rate plan and slab types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{OrganizationId, RatePlanId};

/// Utility being metered or billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityType {
    /// Electricity (kWh).
    Electricity,
    /// Water (m³ or litres).
    Water,
    /// Piped gas.
    Gas,
    /// Sewage.
    Sewage,
    /// Garbage collection.
    Garbage,
    /// Anything else.
    Other,
}

impl UtilityType {
    /// Returns the string representation of the utility type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Gas => "gas",
            Self::Sewage => "sewage",
            Self::Garbage => "garbage",
            Self::Other => "other",
        }
    }

    /// Human-readable label used on invoice lines.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Electricity => "Electricity",
            Self::Water => "Water",
            Self::Gas => "Gas",
            Self::Sewage => "Sewage",
            Self::Garbage => "Garbage",
            Self::Other => "Utility",
        }
    }
}

impl fmt::Display for UtilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One consumption tier of a rate plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityRateSlab {
    /// Position within the plan; unique per plan.
    pub slab_order: u32,
    /// Lower bound of the tier (units).
    pub from_units: Decimal,
    /// Upper bound of the tier; `None` for the open-ended last tier.
    pub to_units: Option<Decimal>,
    /// Price per unit consumed inside this tier.
    pub rate_per_unit: Decimal,
    /// Flat charge added once consumption reaches this tier.
    pub fixed_charge: Option<Decimal>,
}

impl UtilityRateSlab {
    /// Units this tier can absorb, `None` when unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<Decimal> {
        self.to_units.map(|to| to - self.from_units)
    }
}

/// A tiered rate plan for one organization and utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityRatePlan {
    /// Unique identifier.
    pub id: RatePlanId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Utility priced by this plan.
    pub utility_type: UtilityType,
    /// Display name.
    pub name: String,
    /// First day the plan applies.
    pub effective_from: NaiveDate,
    /// Last day the plan applies, if any.
    pub effective_to: Option<NaiveDate>,
    /// Inactive plans are never selected.
    pub is_active: bool,
    /// Bill the first slab's fixed charge even when nothing was consumed.
    pub fixed_charge_on_zero_usage: bool,
    /// Tax rate in percent applied to statements priced with this plan.
    pub tax_rate: Decimal,
    /// Tiers, expected in `slab_order`.
    pub slabs: Vec<UtilityRateSlab>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UtilityRatePlan {
    /// Returns true if the plan is active and its window contains `date`.
    #[must_use]
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from <= date
            && self.effective_to.is_none_or(|to| date <= to)
    }
}

/// A validated plan ready for pricing: slabs sorted and contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRatePlan {
    /// The selected plan.
    pub plan_id: RatePlanId,
    /// Plan name, printed on invoice lines.
    pub name: String,
    /// Zero-usage fixed-charge policy.
    pub fixed_charge_on_zero_usage: bool,
    /// Tax rate in percent.
    pub tax_rate: Decimal,
    /// Sorted, contiguous slabs.
    pub slabs: Vec<UtilityRateSlab>,
}
