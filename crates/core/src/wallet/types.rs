//! Wallet domain types.
//!
//! These mirror the persisted enums one-to-one; the string forms are the
//! values stored in the database.

use chrono::{DateTime, Utc};
use kasa_shared::types::{DepositId, MerchantId, PaymentId, ReceiverAccountId, WalletTransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a merchant is charged for a verified payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    /// `charge_value` percent of the payment amount.
    Percentage,
    /// A flat `charge_value` per payment.
    Fixed,
}

impl ChargeType {
    /// Returns the string representation of the charge type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "PERCENTAGE",
            Self::Fixed => "FIXED",
        }
    }

    /// Parses a charge type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PERCENTAGE" => Some(Self::Percentage),
            "FIXED" => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    /// Verification fee deducted for a payment (negative amount).
    Charge,
    /// Credited bank deposit (positive amount).
    Deposit,
    /// Administrative correction (either sign).
    Adjustment,
}

impl WalletTransactionType {
    /// Returns the string representation of the transaction type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "CHARGE",
            Self::Deposit => "DEPOSIT",
            Self::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for WalletTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deposit status.
///
/// Valid transitions:
/// - Pending → Verified | Unverified | Expired
/// - Unverified → Verified | Unverified (retry)
///
/// Verified and Expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    /// Placeholder created, waiting for the merchant's bank reference.
    Pending,
    /// Reconciled and credited to the wallet.
    Verified,
    /// Verification attempted and failed; may be retried.
    Unverified,
    /// Placeholder outlived its time to live.
    Expired,
}

impl DepositStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Unverified => "UNVERIFIED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Expired)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Pending, Self::Verified | Self::Unverified | Self::Expired)
                | (Self::Unverified, Self::Verified | Self::Unverified)
        )
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver account availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiverAccountStatus {
    /// Shown to merchants and used for matching.
    Active,
    /// Retired; kept for historical deposits.
    Inactive,
}

impl ReceiverAccountStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for ReceiverAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charge configuration of one merchant wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChargeConfig {
    /// Whether the wallet is charged at all.
    pub wallet_enabled: bool,
    /// Charge type, unset means no charge.
    pub charge_type: Option<ChargeType>,
    /// Percentage or fixed amount, depending on `charge_type`.
    pub charge_value: Option<Decimal>,
}

/// Administrative replacement of a merchant's charge settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeSettingsInput {
    /// Enable or disable wallet charging.
    pub wallet_enabled: bool,
    /// Charge type; must be set together with `charge_value`.
    pub charge_type: Option<ChargeType>,
    /// Charge value; must be set together with `charge_type`.
    pub charge_value: Option<Decimal>,
    /// Balance floor for charges; `None` means zero.
    pub min_balance: Option<Decimal>,
}

/// Balance and settings snapshot returned to merchant-facing clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Owning merchant.
    pub merchant_id: MerchantId,
    /// Current balance (projection of the ledger).
    pub balance: Decimal,
    /// Charge configuration.
    pub charge: ChargeConfig,
    /// Configured balance floor, if any.
    pub min_balance: Option<Decimal>,
    /// Last change to the account row.
    pub updated_at: DateTime<Utc>,
}

/// What a ledger row is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedEntity {
    /// The payment a charge was taken for.
    Payment(PaymentId),
    /// The deposit a credit came from.
    Deposit(DepositId),
    /// Nothing (manual adjustments).
    None,
}

impl RelatedEntity {
    /// Returns the linked payment, if any.
    #[must_use]
    pub const fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Self::Payment(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the linked deposit, if any.
    #[must_use]
    pub const fn deposit_id(&self) -> Option<DepositId> {
        match self {
            Self::Deposit(id) => Some(*id),
            _ => None,
        }
    }
}

/// One request to the balance mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntryRequest {
    /// Merchant whose balance changes.
    pub merchant_id: MerchantId,
    /// Ledger row type.
    pub transaction_type: WalletTransactionType,
    /// Signed amount; negative debits the wallet.
    pub signed_amount: Decimal,
    /// Payment or deposit this row belongs to.
    pub related: RelatedEntity,
    /// Human-readable description.
    pub description: String,
    /// Free-form metadata stored with the row.
    pub metadata: Option<serde_json::Value>,
}

/// Result of the payments-facing charge operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChargeOutcome {
    /// Wallet charged.
    Charged {
        /// Amount deducted (positive).
        charge_amount: Decimal,
        /// Ledger row id.
        transaction_id: WalletTransactionId,
        /// Balance after the charge.
        balance_after: Decimal,
    },
    /// Nothing to charge (wallet disabled, no config, or zero charge).
    Skipped {
        /// Why nothing happened.
        reason: ChargeSkipReason,
    },
    /// The payment already has a charge on the ledger.
    AlreadyCharged {
        /// Existing ledger row id.
        transaction_id: WalletTransactionId,
    },
    /// Charging would breach the balance floor; nothing was written.
    InsufficientBalance {
        /// Charge that was attempted.
        required: Decimal,
        /// Balance at the time of the attempt.
        available: Decimal,
        /// Floor the balance must stay at or above.
        minimum: Decimal,
    },
}

impl ChargeOutcome {
    /// Returns true unless the charge was refused for insufficient balance.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::InsufficientBalance { .. })
    }

    /// Amount actually deducted by this call.
    #[must_use]
    pub fn charge_amount(&self) -> Decimal {
        match self {
            Self::Charged { charge_amount, .. } => *charge_amount,
            _ => Decimal::ZERO,
        }
    }

    /// Ledger row created or found for the payment.
    #[must_use]
    pub const fn transaction_id(&self) -> Option<WalletTransactionId> {
        match self {
            Self::Charged { transaction_id, .. } | Self::AlreadyCharged { transaction_id } => {
                Some(*transaction_id)
            }
            _ => None,
        }
    }
}

/// Why a charge was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeSkipReason {
    /// Wallet charging is disabled for the merchant.
    WalletDisabled,
    /// Charge type or value is not configured.
    NotConfigured,
    /// Computed charge rounds to zero or less.
    ZeroCharge,
}

/// Request to reconcile a bank reference against pending deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDepositRequest {
    /// Merchant making the claim.
    pub merchant_id: MerchantId,
    /// Bank/provider code.
    pub provider: String,
    /// Bank transaction reference.
    pub reference: String,
    /// Placeholder to fill, when the client knows it.
    pub deposit_id: Option<DepositId>,
}

/// Request to create a pending deposit placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePendingDepositInput {
    /// Merchant announcing the transfer.
    pub merchant_id: MerchantId,
    /// Bank/provider code.
    pub provider: String,
    /// Amount the merchant intends to transfer.
    pub amount: Decimal,
    /// Receiver account the merchant will transfer into.
    pub receiver_account_id: Option<ReceiverAccountId>,
    /// Bank reference, when already known.
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_transitions() {
        use DepositStatus::{Expired, Pending, Unverified, Verified};

        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Unverified));
        assert!(Pending.can_transition_to(Expired));
        assert!(Unverified.can_transition_to(Verified));
        assert!(Unverified.can_transition_to(Unverified));

        assert!(!Verified.can_transition_to(Unverified));
        assert!(!Verified.can_transition_to(Verified));
        assert!(!Expired.can_transition_to(Verified));
        assert!(!Unverified.can_transition_to(Pending));
        assert!(!Unverified.can_transition_to(Expired));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DepositStatus::Verified.is_terminal());
        assert!(DepositStatus::Expired.is_terminal());
        assert!(!DepositStatus::Pending.is_terminal());
        assert!(!DepositStatus::Unverified.is_terminal());
    }

    #[test]
    fn test_charge_type_parse() {
        assert_eq!(ChargeType::parse("percentage"), Some(ChargeType::Percentage));
        assert_eq!(ChargeType::parse("FIXED"), Some(ChargeType::Fixed));
        assert_eq!(ChargeType::parse("tiered"), None);
        assert_eq!(ChargeType::Percentage.to_string(), "PERCENTAGE");
    }

    #[test]
    fn test_status_display_matches_stored_value() {
        assert_eq!(ReceiverAccountStatus::Active.to_string(), "ACTIVE");
        assert_eq!(ReceiverAccountStatus::Inactive.to_string(), "INACTIVE");
        assert_eq!(DepositStatus::Unverified.to_string(), "UNVERIFIED");
    }

    #[test]
    fn test_charge_outcome_accessors() {
        let id = WalletTransactionId::new();
        let charged = ChargeOutcome::Charged {
            charge_amount: Decimal::new(2500, 2),
            transaction_id: id,
            balance_after: Decimal::new(7500, 2),
        };
        assert!(charged.is_success());
        assert_eq!(charged.transaction_id(), Some(id));
        assert_eq!(charged.charge_amount(), Decimal::new(2500, 2));

        let refused = ChargeOutcome::InsufficientBalance {
            required: Decimal::TEN,
            available: Decimal::ONE,
            minimum: Decimal::ZERO,
        };
        assert!(!refused.is_success());
        assert_eq!(refused.transaction_id(), None);
        assert_eq!(refused.charge_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_charge_outcome_serializes_tagged() {
        let skipped = ChargeOutcome::Skipped {
            reason: ChargeSkipReason::WalletDisabled,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "wallet_disabled");
    }
}
