//! Property-based tests for ChargeCalculator.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::charge::ChargeCalculator;
use super::types::{ChargeConfig, ChargeType};
use kasa_shared::types::round_minor;

/// Strategy to generate payment amounts (0.01 to 1,000,000.00).
fn payment_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate percentages (0.00 to 100.00).
fn percentage() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|v| Decimal::new(v, 2))
}

fn enabled(charge_type: ChargeType, value: Decimal) -> ChargeConfig {
    ChargeConfig {
        wallet_enabled: true,
        charge_type: Some(charge_type),
        charge_value: Some(value),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A percentage charge never exceeds the payment and is never negative.
    #[test]
    fn prop_percentage_charge_bounded(amount in payment_amount(), pct in percentage()) {
        let charge = ChargeCalculator::charge(&enabled(ChargeType::Percentage, pct), amount)
            .expect("configured wallet always yields a charge");
        prop_assert!(charge >= Decimal::ZERO);
        prop_assert!(charge <= amount);
    }

    /// Percentage arithmetic is exact: charge * 100 == amount * pct.
    #[test]
    fn prop_percentage_charge_exact(amount in payment_amount(), pct in percentage()) {
        let charge = ChargeCalculator::charge(&enabled(ChargeType::Percentage, pct), amount)
            .expect("configured wallet always yields a charge");
        prop_assert_eq!(charge * Decimal::ONE_HUNDRED, amount * pct);
    }

    /// A fixed charge ignores the payment amount.
    #[test]
    fn prop_fixed_charge_independent_of_amount(
        a in payment_amount(),
        b in payment_amount(),
        fee in (0i64..100_000i64).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let config = enabled(ChargeType::Fixed, fee);
        prop_assert_eq!(ChargeCalculator::charge(&config, a), ChargeCalculator::charge(&config, b));
    }

    /// Summing many rounded charges drifts from the exact sum by at most half
    /// a cent per charge.
    #[test]
    fn prop_rounding_error_bounded(amounts in prop::collection::vec(payment_amount(), 1..50)) {
        let config = enabled(ChargeType::Percentage, Decimal::new(25, 1));
        let mut exact = Decimal::ZERO;
        let mut rounded = Decimal::ZERO;
        for amount in &amounts {
            let charge = ChargeCalculator::charge(&config, *amount).unwrap_or_default();
            exact += charge;
            rounded += round_minor(charge);
        }
        let tolerance = Decimal::new(5, 3) * Decimal::from(amounts.len());
        prop_assert!((exact - rounded).abs() <= tolerance);
    }

    /// A disabled wallet never charges, whatever the configuration.
    #[test]
    fn prop_disabled_never_charges(amount in payment_amount(), pct in percentage()) {
        let config = ChargeConfig {
            wallet_enabled: false,
            charge_type: Some(ChargeType::Percentage),
            charge_value: Some(pct),
        };
        prop_assert_eq!(ChargeCalculator::charge(&config, amount), None);
    }
}
