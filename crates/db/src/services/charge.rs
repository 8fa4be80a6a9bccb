//! ChargeForPayment: the payments-facing wallet charge.

use kasa_core::wallet::{
    ChargeCalculator, ChargeOutcome, ChargeSkipReason, LedgerEntryRequest, NotificationDispatcher,
    NotificationEvent, RelatedEntity, WalletError, WalletPolicy, WalletTransactionType,
};
use kasa_shared::types::{MerchantId, PaymentId, WalletTransactionId, round_minor};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::json;
use tracing::{debug, info};

use crate::error::map_db_err;
use crate::repositories::{PaymentRepository, WalletRepository};
use crate::retry::retry_on_conflict;

/// Charges merchant wallets for verified payments.
#[derive(Debug, Clone)]
pub struct ChargeService {
    db: DatabaseConnection,
    policy: WalletPolicy,
    dispatcher: NotificationDispatcher,
}

impl ChargeService {
    /// Creates a charge service.
    #[must_use]
    pub const fn new(
        db: DatabaseConnection,
        policy: WalletPolicy,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            policy,
            dispatcher,
        }
    }

    /// Deducts the configured charge for `payment_id` from the wallet.
    ///
    /// Skips when the wallet is disabled, unconfigured, or the charge rounds
    /// to zero. A charge the balance floor refuses comes back as
    /// `ChargeOutcome::InsufficientBalance`, not as an error. A payment is
    /// charged at most once; repeats return `ChargeOutcome::AlreadyCharged`.
    pub async fn charge_for_payment(
        &self,
        merchant_id: MerchantId,
        payment_id: PaymentId,
        payment_amount: Decimal,
    ) -> Result<ChargeOutcome, WalletError> {
        if payment_amount < Decimal::ZERO {
            return Err(WalletError::Validation(
                "payment amount must not be negative".to_string(),
            ));
        }

        let outcome = retry_on_conflict(&self.policy, "charge_for_payment", move || {
            self.try_charge(merchant_id, payment_id, payment_amount)
        })
        .await?;

        self.notify(merchant_id, payment_id, &outcome);
        Ok(outcome)
    }

    async fn try_charge(
        &self,
        merchant_id: MerchantId,
        payment_id: PaymentId,
        payment_amount: Decimal,
    ) -> Result<ChargeOutcome, WalletError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let account = WalletRepository::lock_account(&txn, merchant_id).await?;

        if let Some(existing) = WalletRepository::find_charge_for_payment(&txn, payment_id).await? {
            debug!(payment_id = %payment_id, transaction_id = %existing.id, "Payment already charged");
            return Ok(ChargeOutcome::AlreadyCharged {
                transaction_id: WalletTransactionId::from_uuid(existing.id),
            });
        }

        if let Some(payment) = PaymentRepository::find(&txn, payment_id).await? {
            if payment.merchant_id != merchant_id.into_inner() {
                return Err(WalletError::Validation(format!(
                    "payment {payment_id} does not belong to merchant {merchant_id}"
                )));
            }
            if let (true, Some(transaction_id)) = (payment.wallet_charged, payment.wallet_transaction_id) {
                return Ok(ChargeOutcome::AlreadyCharged {
                    transaction_id: WalletTransactionId::from_uuid(transaction_id),
                });
            }
        }

        let config = account.charge_config();
        let Some(charge) = ChargeCalculator::charge(&config, payment_amount) else {
            let reason = if config.wallet_enabled {
                ChargeSkipReason::NotConfigured
            } else {
                ChargeSkipReason::WalletDisabled
            };
            return Ok(ChargeOutcome::Skipped { reason });
        };

        let charge = round_minor(charge);
        if charge <= Decimal::ZERO {
            return Ok(ChargeOutcome::Skipped {
                reason: ChargeSkipReason::ZeroCharge,
            });
        }

        let request = LedgerEntryRequest {
            merchant_id,
            transaction_type: WalletTransactionType::Charge,
            signed_amount: -charge,
            related: RelatedEntity::Payment(payment_id),
            description: format!("Verification charge for payment {payment_id}"),
            metadata: Some(json!({
                "payment_amount": payment_amount,
                "charge_type": config.charge_type,
                "charge_value": config.charge_value,
            })),
        };

        match WalletRepository::post_to_locked_account(&txn, &account, &request).await {
            Ok(entry) => {
                let transaction_id = WalletTransactionId::from_uuid(entry.id);
                PaymentRepository::mark_charged(&txn, payment_id, transaction_id).await?;
                txn.commit().await.map_err(map_db_err)?;

                info!(
                    merchant_id = %merchant_id,
                    payment_id = %payment_id,
                    charge_amount = %charge,
                    balance_after = %entry.balance_after,
                    "Payment charged"
                );
                Ok(ChargeOutcome::Charged {
                    charge_amount: charge,
                    transaction_id,
                    balance_after: entry.balance_after,
                })
            }
            Err(WalletError::InsufficientBalance {
                required,
                available,
                minimum,
            }) => Ok(ChargeOutcome::InsufficientBalance {
                required,
                available,
                minimum,
            }),
            Err(err) => Err(err),
        }
    }

    fn notify(&self, merchant_id: MerchantId, payment_id: PaymentId, outcome: &ChargeOutcome) {
        let (event, payload) = match outcome {
            ChargeOutcome::Charged {
                charge_amount,
                transaction_id,
                balance_after,
            } => (
                NotificationEvent::Charged,
                json!({
                    "payment_id": payment_id,
                    "charge_amount": charge_amount,
                    "transaction_id": transaction_id,
                    "balance_after": balance_after,
                }),
            ),
            ChargeOutcome::InsufficientBalance {
                required,
                available,
                minimum,
            } => (
                NotificationEvent::BalanceInsufficient,
                json!({
                    "payment_id": payment_id,
                    "required": required,
                    "available": available,
                    "minimum": minimum,
                }),
            ),
            ChargeOutcome::Skipped { .. } | ChargeOutcome::AlreadyCharged { .. } => return,
        };
        self.dispatcher.dispatch(event, merchant_id, payload);
    }
}
