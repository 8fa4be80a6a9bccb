//! Wallet repository: merchant wallet accounts and the append-only ledger.
//!
//! [`WalletRepository::apply_ledger_entry`] is the only code path that
//! changes a balance. Each call:
//! 1. locks the account row (`SELECT ... FOR UPDATE`),
//! 2. plans the posting with [`BalanceGuard`] against the locked balance,
//! 3. inserts the ledger row,
//! 4. updates the cached balance with `WHERE version = <locked version>`,
//!
//! all inside one database transaction.

use chrono::{DateTime, Utc};
use kasa_core::wallet::{
    BalanceGuard, ChargeCalculator, ChargeSettingsInput, LedgerChainError, LedgerEntryRequest,
    WalletBalance, WalletError, WalletPolicy, WalletTransactionType, verify_projection,
};
use kasa_shared::types::{MerchantId, PageRequest, PageResponse, PaymentId, WalletTransactionId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, warn};

use crate::entities::{
    merchant_wallet_accounts,
    sea_orm_active_enums::{WalletChargeType, WalletTransactionKind},
    wallet_transactions,
};
use crate::error::map_db_err;
use crate::retry::retry_on_conflict;

/// Filter options for transaction history.
#[derive(Debug, Clone, Default)]
pub struct TransactionHistoryFilter {
    /// Only rows of this type.
    pub transaction_type: Option<WalletTransactionType>,
    /// Rows created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Rows created at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

/// Result of auditing one merchant's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAudit {
    /// Audited merchant.
    pub merchant_id: MerchantId,
    /// Balance stored on the account row.
    pub cached_balance: Decimal,
    /// Number of ledger rows.
    pub entries: usize,
    /// First inconsistency found, if any.
    pub violation: Option<LedgerChainError>,
}

impl LedgerAudit {
    /// Returns true if the ledger chain and the cached balance agree.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.violation.is_none()
    }
}

/// Wallet repository.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
    policy: WalletPolicy,
}

impl WalletRepository {
    /// Creates a wallet repository with the default policy.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_policy(db, WalletPolicy::default())
    }

    /// Creates a wallet repository with an explicit policy.
    #[must_use]
    pub const fn with_policy(db: DatabaseConnection, policy: WalletPolicy) -> Self {
        Self { db, policy }
    }

    /// Creates the merchant's wallet account: disabled, zero balance.
    ///
    /// Idempotent; an existing account is returned unchanged.
    pub async fn create_account(
        &self,
        merchant_id: MerchantId,
    ) -> Result<merchant_wallet_accounts::Model, WalletError> {
        let now = Utc::now().into();
        let account = merchant_wallet_accounts::ActiveModel {
            merchant_id: Set(merchant_id.into_inner()),
            balance: Set(Decimal::ZERO),
            wallet_enabled: Set(false),
            charge_type: Set(None),
            charge_value: Set(None),
            min_balance: Set(None),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = merchant_wallet_accounts::Entity::insert(account)
            .on_conflict(
                OnConflict::column(merchant_wallet_accounts::Column::MerchantId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        if inserted > 0 {
            info!(merchant_id = %merchant_id, "Wallet account created");
        }

        self.find_account(merchant_id).await
    }

    /// Finds the account row.
    pub async fn find_account(
        &self,
        merchant_id: MerchantId,
    ) -> Result<merchant_wallet_accounts::Model, WalletError> {
        merchant_wallet_accounts::Entity::find_by_id(merchant_id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::MerchantNotFound(merchant_id))
    }

    /// Returns the balance and charge settings.
    pub async fn get_balance(&self, merchant_id: MerchantId) -> Result<WalletBalance, WalletError> {
        Ok(self.find_account(merchant_id).await?.to_balance())
    }

    /// Lists ledger rows, newest first.
    pub async fn transaction_history(
        &self,
        merchant_id: MerchantId,
        filter: &TransactionHistoryFilter,
        page: PageRequest,
    ) -> Result<PageResponse<wallet_transactions::Model>, WalletError> {
        self.find_account(merchant_id).await?;
        let page = page.clamped(self.policy.history_max_per_page);

        let mut query = wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::MerchantId.eq(merchant_id.into_inner()));
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(
                wallet_transactions::Column::TransactionType
                    .eq(WalletTransactionKind::from(transaction_type)),
            );
        }
        if let Some(from) = filter.from {
            query = query.filter(wallet_transactions::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(wallet_transactions::Column::CreatedAt.lte(to));
        }

        let total = query.clone().count(&self.db).await.map_err(map_db_err)?;
        let rows = query
            .order_by_desc(wallet_transactions::Column::Sequence)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(PageResponse::new(rows, page.page, page.per_page, total))
    }

    /// Applies one signed ledger entry, retrying on write conflicts.
    ///
    /// Fails with `InsufficientBalance` (nothing written) if a debit would
    /// take the balance below the account's floor.
    pub async fn apply_ledger_entry(
        &self,
        request: &LedgerEntryRequest,
    ) -> Result<wallet_transactions::Model, WalletError> {
        retry_on_conflict(&self.policy, "apply_ledger_entry", move || {
            self.try_apply_ledger_entry(request)
        })
        .await
    }

    async fn try_apply_ledger_entry(
        &self,
        request: &LedgerEntryRequest,
    ) -> Result<wallet_transactions::Model, WalletError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let entry = Self::apply_ledger_entry_in(&txn, request).await?;
        txn.commit().await.map_err(map_db_err)?;
        Ok(entry)
    }

    /// Applies one ledger entry inside the caller's transaction.
    ///
    /// The caller commits, and retries the whole unit on
    /// `ConcurrentModification`.
    pub async fn apply_ledger_entry_in(
        txn: &DatabaseTransaction,
        request: &LedgerEntryRequest,
    ) -> Result<wallet_transactions::Model, WalletError> {
        let account = Self::lock_account(txn, request.merchant_id).await?;
        Self::post_to_locked_account(txn, &account, request).await
    }

    /// Reads the account row under `FOR UPDATE`.
    pub async fn lock_account(
        txn: &DatabaseTransaction,
        merchant_id: MerchantId,
    ) -> Result<merchant_wallet_accounts::Model, WalletError> {
        merchant_wallet_accounts::Entity::find_by_id(merchant_id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::MerchantNotFound(merchant_id))
    }

    /// Posts `request` against an account row locked by this transaction.
    pub async fn post_to_locked_account(
        txn: &DatabaseTransaction,
        account: &merchant_wallet_accounts::Model,
        request: &LedgerEntryRequest,
    ) -> Result<wallet_transactions::Model, WalletError> {
        check_sign(request)?;

        let guard = BalanceGuard::new(account.min_balance);
        let posting = match guard.plan(account.balance, request.signed_amount) {
            Ok(posting) => posting,
            Err(err) => {
                if let WalletError::InsufficientBalance {
                    required,
                    available,
                    minimum,
                } = &err
                {
                    warn!(
                        merchant_id = %request.merchant_id,
                        transaction_type = %request.transaction_type,
                        required = %required,
                        available = %available,
                        minimum = %minimum,
                        "Balance guard refused ledger entry"
                    );
                }
                return Err(err);
            }
        };

        let sequence = account.version + 1;
        let entry = wallet_transactions::ActiveModel {
            id: Set(WalletTransactionId::new().into_inner()),
            merchant_id: Set(account.merchant_id),
            sequence: Set(sequence),
            transaction_type: Set(request.transaction_type.into()),
            amount: Set(posting.amount),
            balance_before: Set(posting.balance_before),
            balance_after: Set(posting.balance_after),
            payment_id: Set(request.related.payment_id().map(PaymentId::into_inner)),
            deposit_id: Set(request.related.deposit_id().map(Into::into)),
            description: Set(request.description.clone()),
            metadata: Set(request.metadata.clone()),
            created_at: Set(Utc::now().into()),
        }
        .insert(txn)
        .await
        .map_err(map_db_err)?;

        let updated = merchant_wallet_accounts::Entity::update_many()
            .col_expr(
                merchant_wallet_accounts::Column::Balance,
                Expr::value(posting.balance_after),
            )
            .col_expr(merchant_wallet_accounts::Column::Version, Expr::value(sequence))
            .filter(merchant_wallet_accounts::Column::MerchantId.eq(account.merchant_id))
            .filter(merchant_wallet_accounts::Column::Version.eq(account.version))
            .exec(txn)
            .await
            .map_err(map_db_err)?;

        if updated.rows_affected == 0 {
            return Err(WalletError::ConcurrentModification);
        }

        info!(
            merchant_id = %request.merchant_id,
            transaction_id = %entry.id,
            transaction_type = %request.transaction_type,
            amount = %posting.amount,
            balance_after = %posting.balance_after,
            "Ledger entry applied"
        );

        Ok(entry)
    }

    /// Finds the CHARGE row for a payment, if any.
    pub async fn find_charge_for_payment<C: ConnectionTrait>(
        conn: &C,
        payment_id: PaymentId,
    ) -> Result<Option<wallet_transactions::Model>, WalletError> {
        wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::PaymentId.eq(payment_id.into_inner()))
            .filter(wallet_transactions::Column::TransactionType.eq(WalletTransactionKind::Charge))
            .one(conn)
            .await
            .map_err(map_db_err)
    }

    /// Replaces the merchant's charge settings.
    pub async fn update_charge_settings(
        &self,
        merchant_id: MerchantId,
        input: ChargeSettingsInput,
    ) -> Result<WalletBalance, WalletError> {
        ChargeCalculator::validate_settings(&input)?;

        let account = self.find_account(merchant_id).await?;
        let mut active: merchant_wallet_accounts::ActiveModel = account.into();
        active.wallet_enabled = Set(input.wallet_enabled);
        active.charge_type = Set(input.charge_type.map(WalletChargeType::from));
        active.charge_value = Set(input.charge_value);
        active.min_balance = Set(input.min_balance);
        active.update(&self.db).await.map_err(map_db_err)?;

        info!(
            merchant_id = %merchant_id,
            wallet_enabled = input.wallet_enabled,
            charge_type = ?input.charge_type,
            charge_value = ?input.charge_value,
            min_balance = ?input.min_balance,
            "Charge settings updated"
        );

        self.get_balance(merchant_id).await
    }

    /// Checks the merchant's ledger chain and the cached balance.
    pub async fn audit_ledger(&self, merchant_id: MerchantId) -> Result<LedgerAudit, WalletError> {
        let account = self.find_account(merchant_id).await?;
        let entries = wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::MerchantId.eq(merchant_id.into_inner()))
            .order_by_asc(wallet_transactions::Column::Sequence)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let links: Vec<_> = entries.iter().map(wallet_transactions::Model::link).collect();
        let violation = verify_projection(account.balance, &links).err();

        if let Some(violation) = &violation {
            warn!(merchant_id = %merchant_id, violation = %violation, "Ledger audit failed");
        }

        Ok(LedgerAudit {
            merchant_id,
            cached_balance: account.balance,
            entries: entries.len(),
            violation,
        })
    }
}

/// CHARGE rows debit, DEPOSIT rows credit; ADJUSTMENT may go either way.
fn check_sign(request: &LedgerEntryRequest) -> Result<(), WalletError> {
    let ok = match request.transaction_type {
        WalletTransactionType::Charge => request.signed_amount < Decimal::ZERO,
        WalletTransactionType::Deposit => request.signed_amount > Decimal::ZERO,
        WalletTransactionType::Adjustment => true,
    };
    if ok {
        Ok(())
    } else {
        Err(WalletError::Validation(format!(
            "{} entries cannot carry amount {}",
            request.transaction_type, request.signed_amount
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasa_core::wallet::RelatedEntity;
    use rust_decimal_macros::dec;

    fn request(transaction_type: WalletTransactionType, amount: Decimal) -> LedgerEntryRequest {
        LedgerEntryRequest {
            merchant_id: MerchantId::new(),
            transaction_type,
            signed_amount: amount,
            related: RelatedEntity::None,
            description: "test".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_charge_must_debit() {
        assert!(check_sign(&request(WalletTransactionType::Charge, dec!(-1))).is_ok());
        assert!(matches!(
            check_sign(&request(WalletTransactionType::Charge, dec!(1))),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_deposit_must_credit() {
        assert!(check_sign(&request(WalletTransactionType::Deposit, dec!(500))).is_ok());
        assert!(check_sign(&request(WalletTransactionType::Deposit, dec!(-500))).is_err());
    }

    #[test]
    fn test_adjustment_either_sign() {
        assert!(check_sign(&request(WalletTransactionType::Adjustment, dec!(-3))).is_ok());
        assert!(check_sign(&request(WalletTransactionType::Adjustment, dec!(3))).is_ok());
    }
}
