//! Operator-initiated wallet operations: balance adjustments and manual
//! deposits.

use chrono::Utc;
use kasa_core::wallet::{
    DepositLifecycle, DepositStatus, LedgerEntryRequest, NotificationDispatcher, NotificationEvent,
    RelatedEntity, WalletError, WalletPolicy, WalletTransactionType,
};
use kasa_shared::types::{DepositId, MerchantId, round_minor};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde_json::json;
use tracing::info;

use crate::entities::{sea_orm_active_enums::WalletDepositStatus, wallet_deposits, wallet_transactions};
use crate::error::map_db_err;
use crate::repositories::{DepositRepository, WalletRepository};
use crate::retry::retry_on_conflict;

use super::reconciliation::expired_error;

/// Result of a manual deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualDeposit {
    /// The VERIFIED deposit row.
    pub deposit: wallet_deposits::Model,
    /// The DEPOSIT ledger row.
    pub entry: wallet_transactions::Model,
}

/// Wallet operations performed by an operator rather than the verifier.
#[derive(Debug, Clone)]
pub struct WalletAdminService {
    db: DatabaseConnection,
    policy: WalletPolicy,
    dispatcher: NotificationDispatcher,
}

impl WalletAdminService {
    /// Creates the admin service.
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

    /// Posts an ADJUSTMENT of `signed_amount` (either sign).
    ///
    /// Debits are subject to the balance floor like any other entry.
    pub async fn adjust_balance(
        &self,
        merchant_id: MerchantId,
        signed_amount: Decimal,
        reason: &str,
        actor: &str,
    ) -> Result<wallet_transactions::Model, WalletError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WalletError::Validation(
                "an adjustment needs a reason".to_string(),
            ));
        }
        let amount = round_minor(signed_amount);
        if amount.is_zero() {
            return Err(WalletError::Validation(
                "adjustment amount must not be zero".to_string(),
            ));
        }

        let request = LedgerEntryRequest {
            merchant_id,
            transaction_type: WalletTransactionType::Adjustment,
            signed_amount: amount,
            related: RelatedEntity::None,
            description: reason.to_string(),
            metadata: Some(json!({ "actor": actor })),
        };
        let repository = WalletRepository::with_policy(self.db.clone(), self.policy.clone());
        let entry = repository.apply_ledger_entry(&request).await?;

        info!(
            merchant_id = %merchant_id,
            actor,
            amount = %amount,
            balance_after = %entry.balance_after,
            "Balance adjusted"
        );
        self.dispatcher.dispatch(
            NotificationEvent::BalanceAdjusted,
            merchant_id,
            json!({
                "transaction_id": entry.id,
                "amount": entry.amount,
                "balance_after": entry.balance_after,
                "reason": reason,
            }),
        );
        Ok(entry)
    }

    /// Records a bank deposit an operator checked by hand, and credits it.
    ///
    /// An open row (PENDING or UNVERIFIED) for the reference is filled in;
    /// otherwise a VERIFIED row is created. A reference that was already
    /// credited is refused with `AlreadyVerified`, an expired one with
    /// `DepositExpired`.
    pub async fn manual_deposit(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
        amount: Decimal,
        actor: &str,
    ) -> Result<ManualDeposit, WalletError> {
        let provider = DepositLifecycle::normalize_provider(provider)?;
        let reference = DepositLifecycle::normalize_reference(reference)?;
        if DepositLifecycle::is_placeholder_reference(&reference) {
            return Err(WalletError::Validation(
                "a placeholder reference cannot be credited".to_string(),
            ));
        }
        DepositLifecycle::validate_amount(amount)?;
        let amount = round_minor(amount);

        let result = retry_on_conflict(&self.policy, "manual_deposit", || {
            self.try_manual_deposit(merchant_id, &provider, &reference, amount, actor)
        })
        .await?;

        info!(
            merchant_id = %merchant_id,
            deposit_id = %result.deposit.id,
            provider = %provider,
            reference = %reference,
            actor,
            amount = %amount,
            "Manual deposit credited"
        );
        self.dispatcher.dispatch(
            NotificationEvent::DepositVerified,
            merchant_id,
            json!({
                "deposit_id": result.deposit.id,
                "provider": result.deposit.provider,
                "reference": result.deposit.reference,
                "status": DepositStatus::Verified,
                "amount": amount,
                "transaction_id": result.entry.id,
                "balance_after": result.entry.balance_after,
                "verified_by": actor,
            }),
        );
        Ok(result)
    }

    async fn try_manual_deposit(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
        amount: Decimal,
        actor: &str,
    ) -> Result<ManualDeposit, WalletError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let now = Utc::now();

        let existing =
            DepositRepository::find_by_reference(&txn, merchant_id, provider, reference).await?;
        let deposit = match existing {
            Some(deposit) if deposit.status == WalletDepositStatus::Verified => {
                return Err(WalletError::AlreadyVerified {
                    provider: provider.to_string(),
                    reference: reference.to_string(),
                });
            }
            Some(deposit) => {
                let deposit_id = DepositId::from_uuid(deposit.id);
                let locked = DepositRepository::lock_by_id(&txn, deposit_id).await?;
                match locked.status {
                    WalletDepositStatus::Verified => {
                        return Err(WalletError::AlreadyVerified {
                            provider: provider.to_string(),
                            reference: reference.to_string(),
                        });
                    }
                    WalletDepositStatus::Expired => return Err(expired_error(&locked, now)),
                    WalletDepositStatus::Pending if locked.is_expired_at(now) => {
                        let expired = DepositRepository::mark_expired(&txn, deposit_id).await?;
                        txn.commit().await.map_err(map_db_err)?;
                        return Err(expired_error(&expired, now));
                    }
                    WalletDepositStatus::Pending | WalletDepositStatus::Unverified => {}
                }
                DepositLifecycle::transition(locked.deposit_status(), DepositStatus::Verified)?;
                let mut active: wallet_deposits::ActiveModel = locked.into();
                active.amount = Set(amount);
                active.status = Set(WalletDepositStatus::Verified);
                active.verified_at = Set(Some(now.into()));
                active.verified_by = Set(Some(actor.to_string()));
                active.error_message = Set(None);
                active.update(&txn).await.map_err(map_db_err)?
            }
            None => wallet_deposits::ActiveModel {
                id: Set(DepositId::new().into_inner()),
                merchant_id: Set(merchant_id.into_inner()),
                provider: Set(provider.to_string()),
                reference: Set(reference.to_string()),
                amount: Set(amount),
                receiver_account_id: Set(None),
                status: Set(WalletDepositStatus::Verified),
                expires_at: Set(None),
                verified_at: Set(Some(now.into())),
                verified_by: Set(Some(actor.to_string())),
                verification_payload: Set(None),
                error_message: Set(None),
                wallet_transaction_id: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await
            .map_err(map_db_err)?,
        };

        let entry = WalletRepository::apply_ledger_entry_in(
            &txn,
            &LedgerEntryRequest {
                merchant_id,
                transaction_type: WalletTransactionType::Deposit,
                signed_amount: amount,
                related: RelatedEntity::Deposit(DepositId::from_uuid(deposit.id)),
                description: format!("Manual deposit {provider} {reference}"),
                metadata: Some(json!({ "provider": provider, "reference": reference, "actor": actor })),
            },
        )
        .await?;

        let mut active: wallet_deposits::ActiveModel = deposit.into();
        active.wallet_transaction_id = Set(Some(entry.id));
        let deposit = active.update(&txn).await.map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)?;

        Ok(ManualDeposit { deposit, entry })
    }
}
