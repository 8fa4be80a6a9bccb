//! Deposit lifecycle rules.
//!
//! Expiry is lazy: nothing sweeps stale placeholders. A PENDING row past its
//! `expires_at` is reported as expired on read and only flipped to EXPIRED
//! when a verification attempt touches it.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;

use super::error::WalletError;
use super::types::{CreatePendingDepositInput, DepositStatus};

/// Prefix of generated placeholder references.
pub const PLACEHOLDER_PREFIX: &str = "PENDING-";

/// Length of the random part of a placeholder reference.
const PLACEHOLDER_TOKEN_LEN: usize = 16;

/// Longest accepted bank reference.
pub const MAX_REFERENCE_LEN: usize = 128;

/// Stateless rules for deposit placeholders and status changes.
pub struct DepositLifecycle;

impl DepositLifecycle {
    /// Generates a unique placeholder reference for a deposit whose bank
    /// reference is not known yet.
    #[must_use]
    pub fn placeholder_reference() -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(PLACEHOLDER_TOKEN_LEN)
            .map(|c| char::from(c).to_ascii_uppercase())
            .collect();
        format!("{PLACEHOLDER_PREFIX}{token}")
    }

    /// Returns true if the reference was generated by
    /// [`Self::placeholder_reference`].
    #[must_use]
    pub fn is_placeholder_reference(reference: &str) -> bool {
        reference.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Expiry instant for a placeholder created at `created_at`.
    #[must_use]
    pub fn expires_at(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        created_at + ttl
    }

    /// Derived expiry flag: strictly after `expires_at`.
    #[must_use]
    pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        expires_at.is_some_and(|at| now > at)
    }

    /// Validates a transition and returns the new status.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidTransition` for illegal transitions.
    pub fn transition(from: DepositStatus, to: DepositStatus) -> Result<DepositStatus, WalletError> {
        if from.can_transition_to(to) {
            Ok(to)
        } else {
            Err(WalletError::InvalidTransition { from, to })
        }
    }

    /// Normalizes and validates a provider code (trimmed, upper-case).
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` if the provider is empty.
    pub fn normalize_provider(provider: &str) -> Result<String, WalletError> {
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(WalletError::Validation("provider is required".to_string()));
        }
        Ok(provider.to_uppercase())
    }

    /// Normalizes and validates a bank reference (trimmed, inner whitespace
    /// removed).
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` if the reference is empty or too long.
    pub fn normalize_reference(reference: &str) -> Result<String, WalletError> {
        let reference: String = reference.chars().filter(|c| !c.is_whitespace()).collect();
        if reference.is_empty() {
            return Err(WalletError::Validation("reference is required".to_string()));
        }
        if reference.len() > MAX_REFERENCE_LEN {
            return Err(WalletError::Validation(format!(
                "reference must be at most {MAX_REFERENCE_LEN} characters"
            )));
        }
        Ok(reference)
    }

    /// Validates a positive deposit amount.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` if the amount is not positive.
    pub fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates and normalizes a pending-deposit request in place.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` on malformed input.
    pub fn validate_pending(
        mut input: CreatePendingDepositInput,
    ) -> Result<CreatePendingDepositInput, WalletError> {
        input.provider = Self::normalize_provider(&input.provider)?;
        Self::validate_amount(input.amount)?;
        input.reference = input
            .reference
            .as_deref()
            .map(Self::normalize_reference)
            .transpose()?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasa_shared::types::MerchantId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_placeholder_reference_shape() {
        let reference = DepositLifecycle::placeholder_reference();
        assert!(DepositLifecycle::is_placeholder_reference(&reference));
        assert_eq!(reference.len(), PLACEHOLDER_PREFIX.len() + PLACEHOLDER_TOKEN_LEN);
        assert!(
            reference[PLACEHOLDER_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
        assert_ne!(reference, DepositLifecycle::placeholder_reference());
        assert!(!DepositLifecycle::is_placeholder_reference("FT000111"));
    }

    #[test]
    fn test_expiry_is_strict() {
        let created = Utc::now();
        let expires = DepositLifecycle::expires_at(created, Duration::minutes(30));
        assert_eq!(expires - created, Duration::minutes(30));

        assert!(!DepositLifecycle::is_expired(Some(expires), expires));
        assert!(!DepositLifecycle::is_expired(
            Some(expires),
            created + Duration::minutes(29)
        ));
        assert!(DepositLifecycle::is_expired(
            Some(expires),
            created + Duration::minutes(31)
        ));
        assert!(!DepositLifecycle::is_expired(None, created + Duration::days(365)));
    }

    #[test]
    fn test_transition() {
        assert_eq!(
            DepositLifecycle::transition(DepositStatus::Pending, DepositStatus::Expired).unwrap(),
            DepositStatus::Expired
        );
        assert!(matches!(
            DepositLifecycle::transition(DepositStatus::Verified, DepositStatus::Unverified),
            Err(WalletError::InvalidTransition { .. })
        ));
        assert!(matches!(
            DepositLifecycle::transition(DepositStatus::Expired, DepositStatus::Verified),
            Err(WalletError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_normalize_inputs() {
        assert_eq!(DepositLifecycle::normalize_provider(" cbe ").unwrap(), "CBE");
        assert!(DepositLifecycle::normalize_provider("  ").is_err());
        assert_eq!(
            DepositLifecycle::normalize_reference(" FT00 0111 ").unwrap(),
            "FT000111"
        );
        assert!(DepositLifecycle::normalize_reference("").is_err());
        assert!(DepositLifecycle::normalize_reference(&"A".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_pending() {
        let input = CreatePendingDepositInput {
            merchant_id: MerchantId::new(),
            provider: "telebirr".to_string(),
            amount: dec!(500),
            receiver_account_id: None,
            reference: Some(" FT 1 ".to_string()),
        };
        let validated = DepositLifecycle::validate_pending(input).unwrap();
        assert_eq!(validated.provider, "TELEBIRR");
        assert_eq!(validated.reference.as_deref(), Some("FT1"));

        let bad = CreatePendingDepositInput {
            merchant_id: MerchantId::new(),
            provider: "CBE".to_string(),
            amount: dec!(0),
            receiver_account_id: None,
            reference: None,
        };
        assert!(matches!(
            DepositLifecycle::validate_pending(bad),
            Err(WalletError::Validation(_))
        ));
    }
}
