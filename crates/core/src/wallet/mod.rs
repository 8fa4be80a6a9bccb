//! Merchant wallet domain logic.
//!
//! This module implements the pure side of the wallet:
//! - Charge calculation per payment
//! - The balance guard and ledger chain checks
//! - Deposit lifecycle rules
//! - Receiver matching and the verification decision
//! - Collaborator traits (Verifier, Notifier) and notification dispatch
//!
//! Persistence and orchestration live in `kasa-db`.

pub mod balance;
pub mod charge;
pub mod deposit;
pub mod error;
pub mod matching;
pub mod notify;
pub mod policy;
pub mod ports;
pub mod types;
pub mod verification;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod balance_props;
#[cfg(test)]
mod charge_props;
#[cfg(test)]
mod matching_props;

pub use balance::{
    BalanceGuard, LedgerChainError, LedgerLink, LedgerPosting, verify_ledger_chain,
    verify_projection,
};
pub use charge::ChargeCalculator;
pub use deposit::{DepositLifecycle, PLACEHOLDER_PREFIX};
pub use error::WalletError;
pub use matching::{ExpectedReceiver, receiver_matches};
pub use notify::NotificationDispatcher;
pub use policy::{RetryPolicy, WalletPolicy};
pub use ports::{NotificationEvent, Notifier, NotifyError, Verifier, VerifierError};
pub use types::{
    ChargeConfig, ChargeOutcome, ChargeSettingsInput, ChargeSkipReason, ChargeType,
    CreatePendingDepositInput, DepositStatus, LedgerEntryRequest, ReceiverAccountStatus,
    RelatedEntity, VerifyDepositRequest, WalletBalance, WalletTransactionType,
};
pub use verification::{
    VerificationDecision, VerificationFailure, VerifierResult, evaluate,
};
