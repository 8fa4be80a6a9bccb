//! Collaborator traits: the external Verifier and Notifier.

use async_trait::async_trait;
use kasa_shared::types::MerchantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::verification::VerifierResult;

/// Failure reaching the verifier. A reference the verifier does not know is
/// NOT an error; it comes back as an unsuccessful [`VerifierResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifierError {
    /// No strategy is registered for the provider.
    #[error("No verifier available for provider {0}")]
    UnsupportedProvider(String),
    /// Transport or upstream failure.
    #[error("Verifier request failed: {0}")]
    Unavailable(String),
}

/// Bank transfer verifier.
///
/// Implementations are provider-specific and live outside this crate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Looks up `reference` at `provider`.
    async fn verify(&self, provider: &str, reference: &str) -> Result<VerifierResult, VerifierError>;
}

/// Wallet events pushed to merchants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// A payment charge was taken from the wallet.
    #[serde(rename = "wallet.charged")]
    Charged,
    /// A charge was refused by the balance guard.
    #[serde(rename = "wallet.balance_insufficient")]
    BalanceInsufficient,
    /// A deposit was verified and credited.
    #[serde(rename = "wallet.deposit_verified")]
    DepositVerified,
    /// A deposit failed verification.
    #[serde(rename = "wallet.deposit_unverified")]
    DepositUnverified,
    /// A pending deposit expired.
    #[serde(rename = "wallet.deposit_expired")]
    DepositExpired,
    /// An administrator adjusted the balance.
    #[serde(rename = "wallet.balance_adjusted")]
    BalanceAdjusted,
}

impl NotificationEvent {
    /// Dotted event type sent to the notifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Charged => "wallet.charged",
            Self::BalanceInsufficient => "wallet.balance_insufficient",
            Self::DepositVerified => "wallet.deposit_verified",
            Self::DepositUnverified => "wallet.deposit_unverified",
            Self::DepositExpired => "wallet.deposit_expired",
            Self::BalanceAdjusted => "wallet.balance_adjusted",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery failure reported by a notifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Merchant notification sink (webhooks, email, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one event. May be called more than once for the same event.
    async fn notify(
        &self,
        event: NotificationEvent,
        merchant_id: MerchantId,
        payload: Value,
    ) -> Result<(), NotifyError>;
}
