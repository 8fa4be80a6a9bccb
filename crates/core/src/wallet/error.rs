//! Wallet error types.
//!
//! Everything except `Verifier`, `Database` and `Internal` is an expected,
//! user-facing outcome that leaves the ledger untouched.

use chrono::{DateTime, Utc};
use kasa_shared::AppError;
use kasa_shared::types::{DepositId, MerchantId, ReceiverAccountId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::DepositStatus;

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    // ========== Validation Errors ==========
    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Not Found Errors ==========
    /// No wallet account exists for the merchant.
    #[error("Wallet account not found for merchant {0}")]
    MerchantNotFound(MerchantId),

    /// Receiver account not found, or none active for the provider.
    #[error("Receiver account not found: {0}")]
    ReceiverAccountNotFound(String),

    /// Receiver account id does not exist.
    #[error("Receiver account {0} does not exist")]
    UnknownReceiverAccount(ReceiverAccountId),

    /// Deposit not found.
    #[error("Deposit not found: {0}")]
    DepositNotFound(DepositId),

    // ========== Conflict Errors ==========
    /// The (merchant, provider, reference) triple was already credited.
    #[error("Deposit {provider}/{reference} is already verified")]
    AlreadyVerified {
        /// Bank/provider code.
        provider: String,
        /// Bank reference.
        reference: String,
    },

    /// The deposit is not in a state that allows the transition.
    #[error("Invalid deposit status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: DepositStatus,
        /// Attempted status.
        to: DepositStatus,
    },

    // ========== Expiry ==========
    /// Pending deposit outlived its time to live (now recorded as EXPIRED).
    #[error("Deposit {deposit_id} expired at {expired_at}")]
    DepositExpired {
        /// The deposit that expired.
        deposit_id: DepositId,
        /// When it expired.
        expired_at: DateTime<Utc>,
    },

    // ========== Balance ==========
    /// Debit would push the balance below the floor.
    #[error("Insufficient balance: required {required}, available {available}, minimum {minimum}")]
    InsufficientBalance {
        /// Amount the debit needs (positive).
        required: Decimal,
        /// Balance before the debit.
        available: Decimal,
        /// Balance floor.
        minimum: Decimal,
    },

    /// Wallet is disabled for this merchant.
    #[error("Wallet is disabled for merchant {0}")]
    WalletDisabled(MerchantId),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Infrastructure ==========
    /// External verifier failed outright.
    #[error("Verifier error: {0}")]
    Verifier(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MerchantNotFound(_) => "WALLET_NOT_FOUND",
            Self::ReceiverAccountNotFound(_) | Self::UnknownReceiverAccount(_) => {
                "RECEIVER_ACCOUNT_NOT_FOUND"
            }
            Self::DepositNotFound(_) => "DEPOSIT_NOT_FOUND",
            Self::AlreadyVerified { .. } => "DEPOSIT_ALREADY_VERIFIED",
            Self::InvalidTransition { .. } => "INVALID_DEPOSIT_TRANSITION",
            Self::DepositExpired { .. } => "DEPOSIT_EXPIRED",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::WalletDisabled(_) => "WALLET_DISABLED",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Verifier(_) => "VERIFIER_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::Validation(_) => 400,

            // 404 Not Found
            Self::MerchantNotFound(_)
            | Self::ReceiverAccountNotFound(_)
            | Self::UnknownReceiverAccount(_)
            | Self::DepositNotFound(_) => 404,

            // 409 Conflict
            Self::AlreadyVerified { .. }
            | Self::InvalidTransition { .. }
            | Self::ConcurrentModification => 409,

            // 410 Gone
            Self::DepositExpired { .. } => 410,

            // 422 Unprocessable - business rules
            Self::InsufficientBalance { .. } | Self::WalletDisabled(_) => 422,

            // 502 Bad Gateway - upstream verifier
            Self::Verifier(_) => 502,

            // 500 Internal Server Error
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        let message = err.to_string();
        match err {
            WalletError::Validation(_) => Self::Validation(message),
            WalletError::MerchantNotFound(_)
            | WalletError::ReceiverAccountNotFound(_)
            | WalletError::UnknownReceiverAccount(_)
            | WalletError::DepositNotFound(_) => Self::NotFound(message),
            WalletError::AlreadyVerified { .. }
            | WalletError::InvalidTransition { .. }
            | WalletError::ConcurrentModification => Self::Conflict(message),
            WalletError::DepositExpired { .. } => Self::Expired(message),
            WalletError::InsufficientBalance { .. } | WalletError::WalletDisabled(_) => {
                Self::BusinessRule(message)
            }
            WalletError::Verifier(_) => Self::ExternalService(message),
            WalletError::Database(_) => Self::Database(message),
            WalletError::Internal(_) => Self::Internal(message),
        }
    }
}
