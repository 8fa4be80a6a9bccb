//! Balance guard and ledger chain rules.
//!
//! The balance mutator in the persistence layer reads the locked account row
//! and hands the figures to [`BalanceGuard::plan`]; the resulting
//! [`LedgerPosting`] is what gets written. Keeping the arithmetic here lets it
//! be tested without a database.

use kasa_shared::types::round_minor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::WalletError;

/// The balance floor a debit must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceGuard {
    floor: Decimal,
}

/// A computed, not yet persisted, ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosting {
    /// Balance read under lock.
    pub balance_before: Decimal,
    /// Signed amount rounded to minor units.
    pub amount: Decimal,
    /// `balance_before + amount`.
    pub balance_after: Decimal,
}

impl BalanceGuard {
    /// Guard for an account with an optional configured minimum balance.
    ///
    /// An unset minimum means the balance may not go below zero.
    #[must_use]
    pub fn new(min_balance: Option<Decimal>) -> Self {
        Self {
            floor: min_balance.unwrap_or(Decimal::ZERO),
        }
    }

    /// The effective floor.
    #[must_use]
    pub const fn floor(&self) -> Decimal {
        self.floor
    }

    /// Plans a posting of `signed_amount` on top of `current_balance`.
    ///
    /// The amount is rounded to minor units (half-up) first. Credits are
    /// always accepted; a debit is refused if it would leave the balance
    /// below the floor.
    ///
    /// # Errors
    ///
    /// - `WalletError::Validation` if the rounded amount is zero
    /// - `WalletError::InsufficientBalance` if a debit breaches the floor
    pub fn plan(
        &self,
        current_balance: Decimal,
        signed_amount: Decimal,
    ) -> Result<LedgerPosting, WalletError> {
        let amount = round_minor(signed_amount);
        if amount.is_zero() {
            return Err(WalletError::Validation(
                "ledger amount rounds to zero".to_string(),
            ));
        }

        let balance_after = current_balance + amount;

        if amount.is_sign_negative() && balance_after < self.floor {
            return Err(WalletError::InsufficientBalance {
                required: -amount,
                available: current_balance,
                minimum: self.floor,
            });
        }

        Ok(LedgerPosting {
            balance_before: current_balance,
            amount,
            balance_after,
        })
    }
}

/// The balance-relevant fields of one persisted ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLink {
    /// Signed amount.
    pub amount: Decimal,
    /// Balance before the row.
    pub balance_before: Decimal,
    /// Balance after the row.
    pub balance_after: Decimal,
}

/// A broken ledger chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerChainError {
    /// `balance_after != balance_before + amount` on one row.
    #[error("Row {index}: balance_after {balance_after} != {balance_before} + {amount}")]
    ArithmeticMismatch {
        /// Position in the ordered ledger.
        index: usize,
        /// Row amount.
        amount: Decimal,
        /// Row balance before.
        balance_before: Decimal,
        /// Row balance after.
        balance_after: Decimal,
    },
    /// A row does not start where the previous row ended.
    #[error("Row {index}: balance_before {found} does not continue from {expected}")]
    Gap {
        /// Position in the ordered ledger.
        index: usize,
        /// Previous row's balance after.
        expected: Decimal,
        /// This row's balance before.
        found: Decimal,
    },
    /// The cached balance differs from the ledger.
    #[error("Cached balance {cached} differs from ledger balance {ledger}")]
    ProjectionMismatch {
        /// Balance stored on the account row.
        cached: Decimal,
        /// Balance derived from the ledger.
        ledger: Decimal,
    },
}

/// Checks an ordered ledger (oldest first) starting from a zero balance and
/// returns the balance it ends at.
///
/// # Errors
///
/// Returns the first broken link.
pub fn verify_ledger_chain(entries: &[LedgerLink]) -> Result<Decimal, LedgerChainError> {
    let mut running = Decimal::ZERO;

    for (index, link) in entries.iter().enumerate() {
        if link.balance_before != running {
            return Err(LedgerChainError::Gap {
                index,
                expected: running,
                found: link.balance_before,
            });
        }
        if link.balance_after != link.balance_before + link.amount {
            return Err(LedgerChainError::ArithmeticMismatch {
                index,
                amount: link.amount,
                balance_before: link.balance_before,
                balance_after: link.balance_after,
            });
        }
        running = link.balance_after;
    }

    Ok(running)
}

/// Checks the ledger chain and that the cached balance equals both its end
/// and the plain sum of amounts.
///
/// # Errors
///
/// Returns the first inconsistency found.
pub fn verify_projection(
    cached_balance: Decimal,
    entries: &[LedgerLink],
) -> Result<(), LedgerChainError> {
    let ledger = verify_ledger_chain(entries)?;
    let sum: Decimal = entries.iter().map(|e| e.amount).sum();

    if cached_balance != ledger || cached_balance != sum {
        return Err(LedgerChainError::ProjectionMismatch {
            cached: cached_balance,
            ledger,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_always_accepted() {
        let guard = BalanceGuard::new(Some(dec!(100)));
        let posting = guard.plan(dec!(0), dec!(500)).unwrap();
        assert_eq!(posting.balance_before, dec!(0));
        assert_eq!(posting.amount, dec!(500.00));
        assert_eq!(posting.balance_after, dec!(500.00));
    }

    #[test]
    fn test_debit_within_floor() {
        let guard = BalanceGuard::new(None);
        let posting = guard.plan(dec!(25), dec!(-25)).unwrap();
        assert_eq!(posting.balance_after, dec!(0));
    }

    #[test]
    fn test_debit_below_zero_refused() {
        let guard = BalanceGuard::new(None);
        let err = guard.plan(dec!(10), dec!(-10.01)).unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                required,
                available,
                minimum,
            } => {
                assert_eq!(required, dec!(10.01));
                assert_eq!(available, dec!(10));
                assert_eq!(minimum, dec!(0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debit_below_min_balance_refused() {
        let guard = BalanceGuard::new(Some(dec!(50)));
        assert!(guard.plan(dec!(100), dec!(-50)).is_ok());
        assert!(matches!(
            guard.plan(dec!(100), dec!(-50.01)),
            Err(WalletError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_amount_rounded_half_up_before_guard() {
        let guard = BalanceGuard::new(None);
        let posting = guard.plan(dec!(1), dec!(-0.005)).unwrap();
        assert_eq!(posting.amount, dec!(-0.01));
        assert_eq!(posting.balance_after, dec!(0.99));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let guard = BalanceGuard::new(None);
        assert!(matches!(
            guard.plan(dec!(10), dec!(0.004)),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_verify_ledger_chain() {
        let entries = [
            LedgerLink {
                amount: dec!(500),
                balance_before: dec!(0),
                balance_after: dec!(500),
            },
            LedgerLink {
                amount: dec!(-25),
                balance_before: dec!(500),
                balance_after: dec!(475),
            },
        ];
        assert_eq!(verify_ledger_chain(&entries), Ok(dec!(475)));
        assert!(verify_projection(dec!(475), &entries).is_ok());
        assert!(matches!(
            verify_projection(dec!(500), &entries),
            Err(LedgerChainError::ProjectionMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_ledger_chain_detects_gap() {
        let entries = [
            LedgerLink {
                amount: dec!(500),
                balance_before: dec!(0),
                balance_after: dec!(500),
            },
            LedgerLink {
                amount: dec!(-25),
                balance_before: dec!(400),
                balance_after: dec!(375),
            },
        ];
        assert!(matches!(
            verify_ledger_chain(&entries),
            Err(LedgerChainError::Gap { index: 1, .. })
        ));
    }

    #[test]
    fn test_verify_ledger_chain_detects_bad_arithmetic() {
        let entries = [LedgerLink {
            amount: dec!(500),
            balance_before: dec!(0),
            balance_after: dec!(501),
        }];
        assert!(matches!(
            verify_ledger_chain(&entries),
            Err(LedgerChainError::ArithmeticMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_empty_ledger_is_zero() {
        assert_eq!(verify_ledger_chain(&[]), Ok(Decimal::ZERO));
        assert!(verify_projection(Decimal::ZERO, &[]).is_ok());
    }
}
