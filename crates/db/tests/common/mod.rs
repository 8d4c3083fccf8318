//! Fixtures shared by the service tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use leasebill_core::lease::{
    ChargeFrequency, ChargeType, Lease, LeaseBillingSetting, LeaseRecurringCharge, LeaseStatus,
};
use leasebill_core::proration::ProrationMethod;
use leasebill_core::rating::{UtilityRatePlan, UtilityRateSlab, UtilityType};
use leasebill_db::repositories::{LeaseRepository, RatePlanRepository};
use leasebill_db::InMemoryStore;
use leasebill_shared::config::{AppConfig, RetryConfig};
use leasebill_shared::types::{LeaseId, OrganizationId, RatePlanId, RecurringChargeId};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Default configuration with instant retries.
pub fn config() -> AppConfig {
    AppConfig {
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        ..AppConfig::default()
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub organization_id: OrganizationId,
    pub config: AppConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            organization_id: OrganizationId::new(),
            config: config(),
        }
    }

    /// Active open-ended lease without billing settings or charges.
    pub async fn lease(&self, start: NaiveDate) -> Lease {
        self.store
            .add_lease(Lease {
                id: LeaseId::new(),
                organization_id: self.organization_id,
                unit_ref: "A-101".to_string(),
                tenant_ref: "T-1".to_string(),
                start_date: start,
                end_date: None,
                status: LeaseStatus::Active,
                deleted_at: None,
            })
            .await
            .unwrap()
    }

    pub async fn settings(&self, lease_id: LeaseId, billing_day: u32) -> LeaseBillingSetting {
        self.store
            .add_billing_setting(LeaseBillingSetting {
                lease_id,
                billing_day,
                payment_term_days: Some(10),
                proration_method: ProrationMethod::ActualDaysInMonth,
                auto_generate: true,
            })
            .await
            .unwrap()
    }

    pub async fn monthly_rent(&self, lease: &Lease, amount: Decimal) -> LeaseRecurringCharge {
        self.store
            .add_recurring_charge(LeaseRecurringCharge {
                id: RecurringChargeId::new(),
                lease_id: lease.id,
                charge_type: ChargeType::Rent,
                description: "Monthly rent".to_string(),
                amount,
                frequency: ChargeFrequency::Monthly,
                start_date: lease.start_date,
                end_date: None,
                tax_rate: Decimal::ZERO,
                is_active: true,
                deleted_at: None,
            })
            .await
            .unwrap()
    }

    /// Lease billed on day 1 with a monthly rent charge.
    pub async fn rented_lease(&self, start: NaiveDate, rent: Decimal) -> Lease {
        let lease = self.lease(start).await;
        self.settings(lease.id, 1).await;
        self.monthly_rent(&lease, rent).await;
        lease
    }

    /// Electricity plan: 0-100 @ 5.00, 100+ @ 7.50.
    pub async fn electricity_plan(&self) -> UtilityRatePlan {
        self.store
            .add_rate_plan(UtilityRatePlan {
                id: RatePlanId::new(),
                organization_id: self.organization_id,
                utility_type: UtilityType::Electricity,
                name: "Residential".to_string(),
                effective_from: date(2026, 1, 1),
                effective_to: None,
                is_active: true,
                fixed_charge_on_zero_usage: false,
                tax_rate: Decimal::ZERO,
                slabs: vec![
                    UtilityRateSlab {
                        slab_order: 1,
                        from_units: dec!(0),
                        to_units: Some(dec!(100)),
                        rate_per_unit: dec!(5.00),
                        fixed_charge: None,
                    },
                    UtilityRateSlab {
                        slab_order: 2,
                        from_units: dec!(100),
                        to_units: None,
                        rate_per_unit: dec!(7.50),
                        fixed_charge: None,
                    },
                ],
                deleted_at: None,
            })
            .await
            .unwrap()
    }
}
