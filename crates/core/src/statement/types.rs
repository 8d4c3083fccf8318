//! Utility statement aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{
    LeaseId, OrganizationId, RatePlanId, StatementId, round_money, round_quantity,
};

use super::error::StatementError;
use crate::concurrency::{INITIAL_VERSION, Versioned};
use crate::period::BillingPeriod;
use crate::rating::{ResolvedRatePlan, SlabBillingCalculator, UtilityType};

/// Statement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementStatus {
    /// Readings are still being entered.
    Draft,
    /// Priced and ready to be invoiced.
    Finalized,
}

impl StatementStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the statement bills from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StatementInput {
    /// Meter readings, priced against the utility's rate plan.
    Metered {
        /// Reading at period start.
        previous: Decimal,
        /// Reading at period end.
        current: Decimal,
    },
    /// Amount passed through from the provider's bill.
    Direct {
        /// Bill amount.
        amount: Decimal,
    },
}

/// One billing-period reading for a lease and utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityStatement {
    /// Unique identifier.
    pub id: StatementId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Lease the statement bills.
    pub lease_id: LeaseId,
    /// Utility measured.
    pub utility_type: UtilityType,
    /// Period the reading covers.
    pub period: BillingPeriod,
    /// Readings or direct amount, once entered.
    pub input: Option<StatementInput>,
    /// Units consumed (three decimals), set on finalize for metered statements.
    pub consumption: Option<Decimal>,
    /// Billable amount before tax, set on finalize.
    pub calculated_amount: Option<Decimal>,
    /// Plan used to price a metered statement.
    pub rate_plan_id: Option<RatePlanId>,
    /// Tax rate in percent for the invoice line.
    pub tax_rate: Decimal,
    /// Lifecycle status.
    pub status: StatementStatus,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the statement was finalized.
    pub finalized_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Version token.
    pub version: i64,
}

impl UtilityStatement {
    /// Creates an empty Draft statement.
    ///
    /// `tax_rate` applies to direct statements; metered statements take the
    /// rate plan's tax rate when finalized.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        lease_id: LeaseId,
        utility_type: UtilityType,
        period: BillingPeriod,
        tax_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StatementId::new(),
            organization_id,
            lease_id,
            utility_type,
            period,
            input: None,
            consumption: None,
            calculated_amount: None,
            rate_plan_id: None,
            tax_rate,
            status: StatementStatus::Draft,
            notes: None,
            finalized_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: INITIAL_VERSION,
        }
    }

    /// Returns true if the statement has been priced.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.status == StatementStatus::Finalized
    }

    /// Returns true if the statement bills from meter readings.
    #[must_use]
    pub fn is_metered(&self) -> bool {
        matches!(self.input, Some(StatementInput::Metered { .. }))
    }

    /// Amount to invoice, available once finalized.
    #[must_use]
    pub fn billable_amount(&self) -> Option<Decimal> {
        if self.is_finalized() {
            self.calculated_amount
        } else {
            None
        }
    }

    /// Records meter readings. Replaces any earlier input.
    ///
    /// # Errors
    ///
    /// `NotEditable` once finalized, `NegativeReading` or `ReadingDecreased`
    /// for bad readings.
    pub fn record_readings(
        &mut self,
        previous: Decimal,
        current: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StatementError> {
        self.ensure_draft()?;
        if previous < Decimal::ZERO {
            return Err(StatementError::NegativeReading(previous));
        }
        if current < previous {
            return Err(StatementError::ReadingDecreased { previous, current });
        }
        let previous = round_quantity(previous);
        let current = round_quantity(current);
        self.input = Some(StatementInput::Metered { previous, current });
        self.consumption = Some(round_quantity(current - previous));
        self.updated_at = now;
        Ok(())
    }

    /// Records a direct bill amount. Replaces any earlier input.
    ///
    /// # Errors
    ///
    /// `NotEditable` once finalized, `NegativeAmount` for `amount < 0`.
    pub fn set_direct_amount(
        &mut self,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StatementError> {
        self.ensure_draft()?;
        if amount < Decimal::ZERO {
            return Err(StatementError::NegativeAmount(amount));
        }
        self.input = Some(StatementInput::Direct {
            amount: round_money(amount),
        });
        self.consumption = None;
        self.updated_at = now;
        Ok(())
    }

    /// Prices the readings against `plan` and finalizes.
    ///
    /// # Errors
    ///
    /// `NotEditable`, `MissingInput`, `InputMismatch` for a direct statement,
    /// or the slab calculator's error.
    pub fn finalize_metered(
        &mut self,
        plan: &ResolvedRatePlan,
        now: DateTime<Utc>,
    ) -> Result<(), StatementError> {
        self.ensure_draft()?;
        let (previous, current) = match self.input {
            Some(StatementInput::Metered { previous, current }) => (previous, current),
            Some(StatementInput::Direct { .. }) => {
                return Err(StatementError::InputMismatch {
                    id: self.id,
                    expected: "metered",
                });
            }
            None => return Err(StatementError::MissingInput(self.id)),
        };

        let consumption = round_quantity(current - previous);
        let charge = SlabBillingCalculator::calculate(
            &plan.slabs,
            consumption,
            plan.fixed_charge_on_zero_usage,
        )?;

        self.consumption = Some(consumption);
        self.calculated_amount = Some(charge.total);
        self.rate_plan_id = Some(plan.plan_id);
        self.tax_rate = plan.tax_rate;
        self.mark_finalized(now);
        Ok(())
    }

    /// Finalizes a direct statement at its entered amount.
    ///
    /// # Errors
    ///
    /// `NotEditable`, `MissingInput`, or `InputMismatch` for a metered statement.
    pub fn finalize_direct(&mut self, now: DateTime<Utc>) -> Result<(), StatementError> {
        self.ensure_draft()?;
        let amount = match self.input {
            Some(StatementInput::Direct { amount }) => amount,
            Some(StatementInput::Metered { .. }) => {
                return Err(StatementError::InputMismatch {
                    id: self.id,
                    expected: "direct",
                });
            }
            None => return Err(StatementError::MissingInput(self.id)),
        };

        self.calculated_amount = Some(amount);
        self.mark_finalized(now);
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), StatementError> {
        if self.is_finalized() {
            Err(StatementError::NotEditable(self.id))
        } else {
            Ok(())
        }
    }

    fn mark_finalized(&mut self, now: DateTime<Utc>) {
        self.status = StatementStatus::Finalized;
        self.finalized_at = Some(now);
        self.updated_at = now;
    }
}

impl Versioned for UtilityStatement {
    const ENTITY: &'static str = "utility_statement";

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::UtilityRateSlab;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn april() -> BillingPeriod {
        BillingPeriod::calendar_month(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()).unwrap()
    }

    fn statement() -> UtilityStatement {
        UtilityStatement::new(
            OrganizationId::new(),
            LeaseId::new(),
            UtilityType::Electricity,
            april(),
            Decimal::ZERO,
            Utc::now(),
        )
    }

    fn plan() -> ResolvedRatePlan {
        ResolvedRatePlan {
            plan_id: RatePlanId::new(),
            name: "Domestic".to_string(),
            fixed_charge_on_zero_usage: false,
            tax_rate: dec!(18.00),
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
        }
    }

    #[test]
    fn test_finalize_metered_prices_consumption() {
        let mut s = statement();
        s.record_readings(dec!(1200), dec!(1350), Utc::now()).unwrap();
        s.finalize_metered(&plan(), Utc::now()).unwrap();

        assert_eq!(s.status, StatementStatus::Finalized);
        assert_eq!(s.consumption, Some(dec!(150)));
        assert_eq!(s.billable_amount(), Some(dec!(875.00)));
        assert_eq!(s.tax_rate, dec!(18.00));
        assert!(s.finalized_at.is_some());
    }

    #[test]
    fn test_consumption_follows_the_latest_input() {
        let mut s = statement();
        s.record_readings(dec!(1000), dec!(1150), Utc::now()).unwrap();
        assert_eq!(s.consumption, Some(dec!(150)));
        assert_eq!(s.billable_amount(), None);

        s.record_readings(dec!(1000), dec!(1040.5), Utc::now()).unwrap();
        assert_eq!(s.consumption, Some(dec!(40.5)));

        s.set_direct_amount(dec!(300), Utc::now()).unwrap();
        assert_eq!(s.consumption, None);
    }

    #[test]
    fn test_finalize_direct() {
        let mut s = statement();
        s.set_direct_amount(dec!(420.5), Utc::now()).unwrap();
        assert_eq!(s.billable_amount(), None);

        s.finalize_direct(Utc::now()).unwrap();
        assert_eq!(s.billable_amount(), Some(dec!(420.50)));
        assert!(!s.is_metered());
    }

    #[test]
    fn test_finalized_statement_is_frozen() {
        let mut s = statement();
        s.set_direct_amount(dec!(10), Utc::now()).unwrap();
        s.finalize_direct(Utc::now()).unwrap();

        let err = s.set_direct_amount(dec!(20), Utc::now()).unwrap_err();
        assert_eq!(err, StatementError::NotEditable(s.id));
        assert!(s.record_readings(dec!(0), dec!(1), Utc::now()).is_err());
        assert!(s.finalize_direct(Utc::now()).is_err());
    }

    #[test]
    fn test_reading_validation() {
        let mut s = statement();
        assert!(matches!(
            s.record_readings(dec!(100), dec!(90), Utc::now()).unwrap_err(),
            StatementError::ReadingDecreased { .. }
        ));
        assert_eq!(
            s.record_readings(dec!(-1), dec!(5), Utc::now()).unwrap_err(),
            StatementError::NegativeReading(dec!(-1))
        );
        assert!(s.input.is_none());
    }

    #[test]
    fn test_finalize_requires_matching_input() {
        let mut s = statement();
        assert_eq!(
            s.finalize_direct(Utc::now()).unwrap_err(),
            StatementError::MissingInput(s.id)
        );

        s.record_readings(dec!(0), dec!(10), Utc::now()).unwrap();
        let err = s.finalize_direct(Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "STATEMENT_INPUT_MISMATCH");
        assert_eq!(s.status, StatementStatus::Draft);
    }

    #[test]
    fn test_zero_consumption_without_fixed_charge_is_zero() {
        let mut s = statement();
        s.record_readings(dec!(500), dec!(500), Utc::now()).unwrap();
        s.finalize_metered(&plan(), Utc::now()).unwrap();
        assert_eq!(s.billable_amount(), Some(Decimal::ZERO));
    }
}
