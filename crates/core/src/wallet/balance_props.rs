//! Property-based tests for the balance guard and ledger chain.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::{BalanceGuard, LedgerLink, verify_ledger_chain, verify_projection};
use super::error::WalletError;

/// Strategy for signed amounts between -1,000.00 and 1,000.00, excluding zero.
fn signed_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        (1i64..100_000i64).prop_map(|c| Decimal::new(c, 2)),
        (1i64..100_000i64).prop_map(|c| Decimal::new(-c, 2)),
    ]
}

/// Strategy for an optional minimum balance.
fn min_balance() -> impl Strategy<Value = Option<Decimal>> {
    prop_oneof![
        Just(None),
        (0i64..50_000i64).prop_map(|c| Some(Decimal::new(c, 2))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Applying any sequence of postings through the guard keeps every row
    /// consistent, the balance at or above the floor after every accepted
    /// debit, and the final balance equal to the sum of accepted amounts.
    #[test]
    fn prop_guarded_ledger_stays_consistent(
        amounts in prop::collection::vec(signed_amount(), 1..100),
        min in min_balance(),
    ) {
        let guard = BalanceGuard::new(min);
        let mut balance = Decimal::ZERO;
        let mut ledger = Vec::new();

        for amount in amounts {
            match guard.plan(balance, amount) {
                Ok(posting) => {
                    if posting.amount.is_sign_negative() {
                        prop_assert!(posting.balance_after >= guard.floor());
                    }
                    ledger.push(LedgerLink {
                        amount: posting.amount,
                        balance_before: posting.balance_before,
                        balance_after: posting.balance_after,
                    });
                    balance = posting.balance_after;
                }
                Err(WalletError::InsufficientBalance { required, available, minimum }) => {
                    prop_assert!(amount.is_sign_negative());
                    prop_assert_eq!(available, balance);
                    prop_assert_eq!(minimum, guard.floor());
                    prop_assert!(available - required < minimum);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        prop_assert_eq!(verify_ledger_chain(&ledger), Ok(balance));
        prop_assert!(verify_projection(balance, &ledger).is_ok());
    }

    /// A refused debit reports exactly the figures the caller needs.
    #[test]
    fn prop_refusal_is_structured(
        balance in (0i64..10_000i64).prop_map(|c| Decimal::new(c, 2)),
        extra in (1i64..10_000i64).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let guard = BalanceGuard::new(None);
        let debit = -(balance + extra);
        match guard.plan(balance, debit) {
            Err(WalletError::InsufficientBalance { required, available, minimum }) => {
                prop_assert_eq!(required, balance + extra);
                prop_assert_eq!(available, balance);
                prop_assert_eq!(minimum, Decimal::ZERO);
            }
            other => prop_assert!(false, "expected refusal, got {other:?}"),
        }
    }
}
