//! Decimal money helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` end to end and only rounded to minor
//! units at the point of persistence.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places stored for every persisted monetary amount.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Rounds an amount to minor units (2 decimal places) using round-half-up.
///
/// Half-up here means ties move away from zero, so `-0.005` becomes `-0.01`
/// and `0.005` becomes `0.01`.
#[must_use]
pub fn round_minor(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MINOR_UNIT_SCALE);
    rounded
}

/// Returns true when the amount carries no more than 2 decimal places of
/// significant digits.
#[must_use]
pub fn is_minor_unit_amount(amount: Decimal) -> bool {
    amount.normalize().scale() <= MINOR_UNIT_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(25), dec!(25.00))]
    #[case(dec!(0.005), dec!(0.01))]
    #[case(dec!(0.004), dec!(0.00))]
    #[case(dec!(1.235), dec!(1.24))]
    #[case(dec!(1.225), dec!(1.23))]
    #[case(dec!(-0.005), dec!(-0.01))]
    #[case(dec!(-1.234), dec!(-1.23))]
    fn test_round_minor_half_up(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_minor(input), expected);
    }

    #[test]
    fn test_round_minor_fixes_scale() {
        assert_eq!(round_minor(dec!(25)).scale(), 2);
        assert_eq!(round_minor(dec!(25.000)).to_string(), "25.00");
    }

    #[test]
    fn test_is_minor_unit_amount() {
        assert!(is_minor_unit_amount(dec!(10)));
        assert!(is_minor_unit_amount(dec!(10.50)));
        assert!(is_minor_unit_amount(dec!(10.5000)));
        assert!(!is_minor_unit_amount(dec!(10.505)));
    }
}
