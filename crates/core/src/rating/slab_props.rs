//! Property-based tests for SlabBillingCalculator.
//!
//! - Charges never decrease as consumption grows
//! - A single open slab bills `quantity × rate`
//! - The breakdown accounts for every unit consumed

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::slab::SlabBillingCalculator;
use super::types::UtilityRateSlab;

/// Strategy to generate a contiguous slab set starting at zero.
///
/// 1-5 slabs, widths 1-500 units, rates 0.00-50.00, optional fixed charge;
/// the last slab is open-ended half of the time.
fn contiguous_slabs() -> impl Strategy<Value = Vec<UtilityRateSlab>> {
    (
        prop::collection::vec(
            (
                1i64..500,
                0i64..5_000,
                prop::option::of(0i64..10_000),
            ),
            1..=5,
        ),
        any::<bool>(),
    )
        .prop_map(|(tiers, open_last)| {
            let mut from = Decimal::ZERO;
            let count = tiers.len();
            tiers
                .into_iter()
                .enumerate()
                .map(|(i, (width, rate_cents, fixed_cents))| {
                    let to = from + Decimal::from(width);
                    let slab = UtilityRateSlab {
                        slab_order: u32::try_from(i + 1).unwrap(),
                        from_units: from,
                        to_units: if open_last && i + 1 == count { None } else { Some(to) },
                        rate_per_unit: Decimal::new(rate_cents, 2),
                        fixed_charge: fixed_cents.map(|c| Decimal::new(c, 2)),
                    };
                    from = to;
                    slab
                })
                .collect()
        })
}

/// Strategy to generate meter quantities from 0.000 to 5,000.000.
fn quantity() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000).prop_map(|thousandths| Decimal::new(thousandths, 3))
}

proptest! {
    #[test]
    fn prop_monotonic_in_quantity(
        slabs in contiguous_slabs(),
        a in quantity(),
        b in quantity(),
        zero_policy in any::<bool>(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_charge = SlabBillingCalculator::calculate(&slabs, low, zero_policy).unwrap();
        let high_charge = SlabBillingCalculator::calculate(&slabs, high, zero_policy).unwrap();
        prop_assert!(low_charge.total <= high_charge.total);
    }

    #[test]
    fn prop_single_open_slab_is_linear(rate_cents in 0i64..10_000, q in quantity()) {
        let slabs = vec![UtilityRateSlab {
            slab_order: 1,
            from_units: Decimal::ZERO,
            to_units: None,
            rate_per_unit: Decimal::new(rate_cents, 2),
            fixed_charge: None,
        }];
        let charge = SlabBillingCalculator::calculate(&slabs, q, false).unwrap();
        prop_assert_eq!(
            charge.total,
            leasebill_shared::types::round_money(q * Decimal::new(rate_cents, 2))
        );
    }

    #[test]
    fn prop_breakdown_covers_quantity(slabs in contiguous_slabs(), q in quantity()) {
        let charge = SlabBillingCalculator::calculate(&slabs, q, false).unwrap();
        let billed: Decimal = charge.breakdown.iter().map(|u| u.units).sum();
        prop_assert_eq!(billed, q);
    }
}
