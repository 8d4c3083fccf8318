//! Slab billing calculation.
//!
//! Consumption fills slabs in order. Each slab takes at most its capacity
//! at its own rate; the last slab takes whatever remains, bounded or not.
//! Every slab the consumption reaches adds its fixed charge once.

use rust_decimal::Decimal;

use leasebill_shared::types::round_money;

use super::error::RatingError;
use super::types::UtilityRateSlab;

/// Units and amount billed inside one slab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlabUsage {
    /// Slab position.
    pub slab_order: u32,
    /// Units billed in this slab.
    pub units: Decimal,
    /// `units × rate_per_unit`, unrounded.
    pub usage_amount: Decimal,
    /// Fixed charge contributed by this slab.
    pub fixed_charge: Decimal,
}

/// Result of pricing one consumption quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlabCharge {
    /// Per-unit charges, rounded to money precision.
    pub usage_charge: Decimal,
    /// Sum of traversed slabs' fixed charges.
    pub fixed_charge: Decimal,
    /// `usage_charge + fixed_charge`.
    pub total: Decimal,
    /// Per-slab breakdown in slab order.
    pub breakdown: Vec<SlabUsage>,
}

/// Stateless slab pricing service.
pub struct SlabBillingCalculator;

impl SlabBillingCalculator {
    /// Price `quantity` against `slabs`.
    ///
    /// `slabs` must already be sorted by `slab_order`; contiguity is the
    /// resolver's job. With zero consumption only the first slab's fixed
    /// charge can be billed, and only when `fixed_charge_on_zero_usage` is set.
    ///
    /// # Errors
    ///
    /// `NegativeQuantity` for `quantity < 0`, `NoSlabs` for an empty slice.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use leasebill_core::rating::{SlabBillingCalculator, UtilityRateSlab};
    ///
    /// let slabs = vec![
    ///     UtilityRateSlab { slab_order: 1, from_units: dec!(0), to_units: Some(dec!(100)), rate_per_unit: dec!(5.00), fixed_charge: None },
    ///     UtilityRateSlab { slab_order: 2, from_units: dec!(100), to_units: None, rate_per_unit: dec!(7.50), fixed_charge: None },
    /// ];
    /// let charge = SlabBillingCalculator::calculate(&slabs, dec!(150), false).unwrap();
    /// assert_eq!(charge.total, dec!(875.00));
    /// ```
    pub fn calculate(
        slabs: &[UtilityRateSlab],
        quantity: Decimal,
        fixed_charge_on_zero_usage: bool,
    ) -> Result<SlabCharge, RatingError> {
        if quantity < Decimal::ZERO {
            return Err(RatingError::NegativeQuantity(quantity));
        }
        let Some(first) = slabs.first() else {
            return Err(RatingError::NoSlabs);
        };

        if quantity.is_zero() {
            let fixed = if fixed_charge_on_zero_usage {
                first.fixed_charge.unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            let breakdown = if fixed.is_zero() {
                Vec::new()
            } else {
                vec![SlabUsage {
                    slab_order: first.slab_order,
                    units: Decimal::ZERO,
                    usage_amount: Decimal::ZERO,
                    fixed_charge: fixed,
                }]
            };
            return Ok(SlabCharge {
                usage_charge: Decimal::ZERO,
                fixed_charge: fixed,
                total: fixed,
                breakdown,
            });
        }

        let last_index = slabs.len() - 1;
        let mut remaining = quantity;
        let mut usage = Decimal::ZERO;
        let mut fixed = Decimal::ZERO;
        let mut breakdown = Vec::with_capacity(slabs.len());

        for (index, slab) in slabs.iter().enumerate() {
            if remaining <= Decimal::ZERO {
                break;
            }

            let units = match slab.capacity() {
                Some(capacity) if index < last_index => remaining.min(capacity),
                _ => remaining,
            };
            let usage_amount = units * slab.rate_per_unit;
            let slab_fixed = slab.fixed_charge.unwrap_or(Decimal::ZERO);

            usage += usage_amount;
            fixed += slab_fixed;
            remaining -= units;

            breakdown.push(SlabUsage {
                slab_order: slab.slab_order,
                units,
                usage_amount,
                fixed_charge: slab_fixed,
            });
        }

        let usage_charge = round_money(usage);
        let fixed_charge = round_money(fixed);

        Ok(SlabCharge {
            usage_charge,
            fixed_charge,
            total: usage_charge + fixed_charge,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn slab(order: u32, from: Decimal, to: Option<Decimal>, rate: Decimal) -> UtilityRateSlab {
        UtilityRateSlab {
            slab_order: order,
            from_units: from,
            to_units: to,
            rate_per_unit: rate,
            fixed_charge: None,
        }
    }

    fn two_tier() -> Vec<UtilityRateSlab> {
        vec![
            slab(1, dec!(0), Some(dec!(100)), dec!(5.00)),
            slab(2, dec!(100), None, dec!(7.50)),
        ]
    }

    #[test]
    fn test_two_tier_150_units() {
        let charge = SlabBillingCalculator::calculate(&two_tier(), dec!(150), false).unwrap();
        assert_eq!(charge.total, dec!(875.00));
        assert_eq!(charge.breakdown.len(), 2);
        assert_eq!(charge.breakdown[0].units, dec!(100));
        assert_eq!(charge.breakdown[1].units, dec!(50));
    }

    #[test]
    fn test_consumption_inside_first_slab() {
        let charge = SlabBillingCalculator::calculate(&two_tier(), dec!(40.5), false).unwrap();
        assert_eq!(charge.total, dec!(202.50));
        assert_eq!(charge.breakdown.len(), 1);
    }

    #[test]
    fn test_fixed_charges_of_traversed_slabs_only() {
        let mut slabs = vec![
            slab(1, dec!(0), Some(dec!(50)), dec!(2.00)),
            slab(2, dec!(50), Some(dec!(150)), dec!(3.00)),
            slab(3, dec!(150), None, dec!(4.00)),
        ];
        slabs[0].fixed_charge = Some(dec!(10.00));
        slabs[1].fixed_charge = Some(dec!(20.00));
        slabs[2].fixed_charge = Some(dec!(40.00));

        // 50 * 2 + 30 * 3 = 190 usage, fixed 10 + 20
        let charge = SlabBillingCalculator::calculate(&slabs, dec!(80), false).unwrap();
        assert_eq!(charge.usage_charge, dec!(190.00));
        assert_eq!(charge.fixed_charge, dec!(30.00));
        assert_eq!(charge.total, dec!(220.00));
    }

    #[test]
    fn test_zero_usage_respects_policy() {
        let mut slabs = two_tier();
        slabs[0].fixed_charge = Some(dec!(25.00));

        let without = SlabBillingCalculator::calculate(&slabs, Decimal::ZERO, false).unwrap();
        assert_eq!(without.total, Decimal::ZERO);
        assert!(without.breakdown.is_empty());

        let with = SlabBillingCalculator::calculate(&slabs, Decimal::ZERO, true).unwrap();
        assert_eq!(with.total, dec!(25.00));
        assert_eq!(with.usage_charge, Decimal::ZERO);
    }

    #[test]
    fn test_excess_over_bounded_last_slab_uses_last_rate() {
        let slabs = vec![
            slab(1, dec!(0), Some(dec!(100)), dec!(1.00)),
            slab(2, dec!(100), Some(dec!(200)), dec!(2.00)),
        ];
        // 100 * 1 + 150 * 2
        let charge = SlabBillingCalculator::calculate(&slabs, dec!(250), false).unwrap();
        assert_eq!(charge.total, dec!(400.00));
        assert_eq!(charge.breakdown[1].units, dec!(150));
    }

    #[test]
    fn test_fractional_units_round_half_up() {
        let slabs = vec![slab(1, dec!(0), None, dec!(0.125))];
        // 0.1 * 0.125 = 0.0125 -> 0.01 ; 0.2 * 0.125 = 0.025 -> 0.03
        assert_eq!(
            SlabBillingCalculator::calculate(&slabs, dec!(0.1), false).unwrap().total,
            dec!(0.01)
        );
        assert_eq!(
            SlabBillingCalculator::calculate(&slabs, dec!(0.2), false).unwrap().total,
            dec!(0.03)
        );
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let err = SlabBillingCalculator::calculate(&two_tier(), dec!(-1), false).unwrap_err();
        assert_eq!(err, RatingError::NegativeQuantity(dec!(-1)));
    }

    #[test]
    fn test_no_slabs_rejected() {
        let err = SlabBillingCalculator::calculate(&[], dec!(1), false).unwrap_err();
        assert_eq!(err, RatingError::NoSlabs);
    }
}
