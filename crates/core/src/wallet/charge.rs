//! Verification fee calculation.
//!
//! Pure arithmetic on `Decimal`; nothing here rounds. Rounding to minor
//! units happens when the charge is written to the ledger.

use kasa_shared::types::is_minor_unit_amount;
use rust_decimal::Decimal;

use super::error::WalletError;
use super::types::{ChargeConfig, ChargeSettingsInput, ChargeType};

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Stateless calculator for per-payment wallet charges.
pub struct ChargeCalculator;

impl ChargeCalculator {
    /// Computes the charge for a payment.
    ///
    /// Returns `None` when the wallet is disabled or the charge type/value
    /// is not configured.
    ///
    /// - `Percentage`: `payment_amount * charge_value / 100`
    /// - `Fixed`: `charge_value`
    #[must_use]
    pub fn charge(config: &ChargeConfig, payment_amount: Decimal) -> Option<Decimal> {
        if !config.wallet_enabled {
            return None;
        }

        let (charge_type, value) = config.charge_type.zip(config.charge_value)?;

        Some(match charge_type {
            ChargeType::Percentage => payment_amount * value / ONE_HUNDRED,
            ChargeType::Fixed => value,
        })
    }

    /// Validates an administrative change to a merchant's charge settings.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` if:
    /// - only one of charge type and value is set
    /// - the value is negative
    /// - a percentage exceeds 100
    /// - a fixed charge or the minimum balance has sub-cent digits
    /// - the minimum balance is negative
    /// - charging is enabled without a charge type
    pub fn validate_settings(input: &ChargeSettingsInput) -> Result<(), WalletError> {
        match (input.charge_type, input.charge_value) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(WalletError::Validation(
                    "charge type and charge value must be set together".to_string(),
                ));
            }
            (Some(charge_type), Some(value)) => {
                if value.is_sign_negative() {
                    return Err(WalletError::Validation(
                        "charge value cannot be negative".to_string(),
                    ));
                }
                if charge_type == ChargeType::Percentage && value > ONE_HUNDRED {
                    return Err(WalletError::Validation(
                        "percentage charge cannot exceed 100".to_string(),
                    ));
                }
                if charge_type == ChargeType::Fixed && !is_minor_unit_amount(value) {
                    return Err(WalletError::Validation(
                        "fixed charge must have at most 2 decimal places".to_string(),
                    ));
                }
            }
            (None, None) => {
                if input.wallet_enabled {
                    return Err(WalletError::Validation(
                        "an enabled wallet needs a charge type and value".to_string(),
                    ));
                }
            }
        }

        if input.min_balance.is_some_and(|min| min.is_sign_negative()) {
            return Err(WalletError::Validation(
                "minimum balance cannot be negative".to_string(),
            ));
        }
        if input.min_balance.is_some_and(|min| !is_minor_unit_amount(min)) {
            return Err(WalletError::Validation(
                "minimum balance must have at most 2 decimal places".to_string(),
            ));
        }

        Ok(())
    }
}
