//! Property-based tests for ProrationCalculator.
//!
//! - Full coverage returns the input amount
//! - Zero occupancy returns zero
//! - The prorated amount never exceeds the full amount

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::calculator::ProrationCalculator;

/// Strategy to generate amounts from 0.00 to 1,000,000.00.
fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #[test]
    fn prop_full_period_is_identity(amount in amount(), days in 1u32..=366) {
        prop_assert_eq!(ProrationCalculator::prorate_days(amount, days, days).unwrap(), amount);
    }

    #[test]
    fn prop_zero_occupancy_is_zero(amount in amount(), days in 1u32..=366) {
        prop_assert_eq!(ProrationCalculator::prorate_days(amount, 0, days).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn prop_prorated_within_bounds(
        amount in amount(),
        (occupied, period) in (1u32..=366).prop_flat_map(|p| (0..=p, Just(p))),
    ) {
        let prorated = ProrationCalculator::prorate_days(amount, occupied, period).unwrap();
        prop_assert!(prorated >= Decimal::ZERO);
        prop_assert!(prorated <= amount);
    }

    #[test]
    fn prop_monotonic_in_occupied_days(
        amount in amount(),
        (a, b, period) in (1u32..=366).prop_flat_map(|p| (0..=p, 0..=p, Just(p))),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_amount = ProrationCalculator::prorate_days(amount, low, period).unwrap();
        let high_amount = ProrationCalculator::prorate_days(amount, high, period).unwrap();
        prop_assert!(low_amount <= high_amount);
    }
}
