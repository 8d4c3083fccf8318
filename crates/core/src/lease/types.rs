//! Lease, billing setting and recurring charge types.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{LeaseId, OrganizationId, RecurringChargeId};

use crate::period::{BillingPeriod, PeriodError, months_between, validate_billing_day};
use crate::proration::ProrationMethod;

/// Lease lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    /// Being prepared, not yet billable.
    Draft,
    /// In force and billable.
    Active,
    /// Ended early.
    Terminated,
    /// Reached its end date.
    Expired,
}

impl LeaseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Terminated => "terminated",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lease as seen by billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    /// Unique identifier.
    pub id: LeaseId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Rented unit reference (opaque to billing).
    pub unit_ref: String,
    /// Tenant reference (opaque to billing).
    pub tenant_ref: String,
    /// First day of the lease term.
    pub start_date: NaiveDate,
    /// Last day of the lease term, if fixed.
    pub end_date: Option<NaiveDate>,
    /// Lifecycle status.
    pub status: LeaseStatus,
    /// Soft-delete marker; the store hides deleted rows from every read.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lease {
    /// Returns true if the lease is active and its term shares a day with `period`.
    #[must_use]
    pub fn is_billable_in(&self, period: &BillingPeriod) -> bool {
        self.status == LeaseStatus::Active && period.overlaps(self.start_date, self.end_date)
    }

    /// The part of `period` covered by the lease term.
    #[must_use]
    pub fn occupancy_in(&self, period: &BillingPeriod) -> Option<BillingPeriod> {
        period.intersect(self.start_date, self.end_date)
    }
}

/// Per-lease billing configuration. Exactly one per lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseBillingSetting {
    /// The lease this setting belongs to.
    pub lease_id: LeaseId,
    /// Day of month a billing period starts on (1-28).
    pub billing_day: u32,
    /// Days between invoice date and due date. Falls back to the configured default.
    pub payment_term_days: Option<u32>,
    /// How partial periods are prorated for this lease.
    pub proration_method: ProrationMethod,
    /// Whether monthly invoice runs pick this lease up.
    pub auto_generate: bool,
}

impl LeaseBillingSetting {
    /// Validates the setting.
    pub fn validate(&self) -> Result<(), PeriodError> {
        validate_billing_day(self.billing_day)
    }
}

/// How often a recurring charge falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeFrequency {
    /// Every billing period.
    Monthly,
    /// Every third month from the start date.
    Quarterly,
    /// Every sixth month from the start date.
    HalfYearly,
    /// Every twelfth month from the start date.
    Yearly,
    /// Once, in the period containing the start date.
    OneTime,
}

impl ChargeFrequency {
    /// Months between due dates, `None` for one-time charges.
    #[must_use]
    pub fn interval_months(&self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::HalfYearly => Some(6),
            Self::Yearly => Some(12),
            Self::OneTime => None,
        }
    }
}

/// What an invoice line bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    /// Base rent.
    Rent,
    /// Maintenance / service charge.
    Maintenance,
    /// Parking.
    Parking,
    /// Amenity or facility fee.
    Amenity,
    /// Metered or flat utility.
    Utility,
    /// Late payment fee.
    LateFee,
    /// Manual adjustment added at generation time.
    Adjustment,
    /// Manual discount added at generation time.
    Discount,
    /// Anything else.
    Other,
}

impl ChargeType {
    /// Returns the string representation of the charge type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent => "rent",
            Self::Maintenance => "maintenance",
            Self::Parking => "parking",
            Self::Amenity => "amenity",
            Self::Utility => "utility",
            Self::LateFee => "late_fee",
            Self::Adjustment => "adjustment",
            Self::Discount => "discount",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A charge template attached to a lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecurringCharge {
    /// Unique identifier.
    pub id: RecurringChargeId,
    /// The lease this charge belongs to.
    pub lease_id: LeaseId,
    /// Line classification.
    pub charge_type: ChargeType,
    /// Text printed on the invoice line.
    pub description: String,
    /// Full-period amount.
    pub amount: Decimal,
    /// How often the charge falls due.
    pub frequency: ChargeFrequency,
    /// First day the charge applies.
    pub start_date: NaiveDate,
    /// Last day the charge applies, if any.
    pub end_date: Option<NaiveDate>,
    /// Tax rate in percent (two decimals).
    pub tax_rate: Decimal,
    /// Inactive templates are ignored by billing.
    pub is_active: bool,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LeaseRecurringCharge {
    /// Returns true if the charge falls due in `period`.
    ///
    /// A periodic charge is due when `start_date + k * interval` lands in the
    /// period for some `k >= 0`; a one-time charge when the period contains
    /// its start date.
    #[must_use]
    pub fn is_due_in(&self, period: &BillingPeriod) -> bool {
        if !self.is_active || !period.overlaps(self.start_date, self.end_date) {
            return false;
        }

        let Some(interval) = self.frequency.interval_months() else {
            return period.contains(self.start_date);
        };

        let elapsed = u32::try_from(months_between(self.start_date, period.start).max(0)).unwrap_or(0);
        let base = elapsed - elapsed % interval;

        [base, base + interval].into_iter().any(|offset| {
            self.start_date
                .checked_add_months(Months::new(offset))
                .is_some_and(|due| {
                    period.contains(due) && self.end_date.is_none_or(|end| due <= end)
                })
        })
    }

    /// Returns true if this charge is billed per period and may be prorated.
    #[must_use]
    pub fn is_proratable(&self) -> bool {
        self.frequency == ChargeFrequency::Monthly
    }
}
