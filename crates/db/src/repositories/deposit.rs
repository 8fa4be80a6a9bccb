//! Deposit repository: pending placeholders and deposit lookups.

use chrono::{DateTime, Utc};
use kasa_core::wallet::{
    CreatePendingDepositInput, DepositLifecycle, DepositStatus, PLACEHOLDER_PREFIX, WalletError,
    WalletPolicy,
};
use kasa_shared::types::{DepositId, MerchantId, PageRequest, PageResponse};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::info;

use crate::entities::{
    merchant_wallet_accounts,
    sea_orm_active_enums::{ReceiverStatus, WalletDepositStatus},
    wallet_deposits,
};
use crate::error::map_db_err;
use crate::repositories::receiver_account::ReceiverAccountRepository;

/// A pending deposit with its expiry derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDeposit {
    /// The stored row (still PENDING).
    #[serde(flatten)]
    pub deposit: wallet_deposits::Model,
    /// True if `now > expires_at`.
    pub is_expired: bool,
}

/// Deposit repository.
#[derive(Debug, Clone)]
pub struct DepositRepository {
    db: DatabaseConnection,
    policy: WalletPolicy,
}

impl DepositRepository {
    /// Creates a deposit repository with the default policy.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_policy(db, WalletPolicy::default())
    }

    /// Creates a deposit repository with an explicit policy.
    #[must_use]
    pub const fn with_policy(db: DatabaseConnection, policy: WalletPolicy) -> Self {
        Self { db, policy }
    }

    /// Creates a PENDING placeholder expiring after the policy's TTL.
    ///
    /// Without a bank reference a placeholder token is generated; the real
    /// reference is filled in at verification time.
    pub async fn create_pending(
        &self,
        input: CreatePendingDepositInput,
    ) -> Result<wallet_deposits::Model, WalletError> {
        let input = DepositLifecycle::validate_pending(input)?;

        merchant_wallet_accounts::Entity::find_by_id(input.merchant_id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::MerchantNotFound(input.merchant_id))?;

        if let Some(receiver_id) = input.receiver_account_id {
            let receiver = ReceiverAccountRepository::find_by_id(&self.db, receiver_id).await?;
            if receiver.status != ReceiverStatus::Active {
                return Err(WalletError::Validation(format!(
                    "receiver account {receiver_id} is inactive"
                )));
            }
            if receiver.provider != input.provider {
                return Err(WalletError::Validation(format!(
                    "receiver account {receiver_id} belongs to {}, not {}",
                    receiver.provider, input.provider
                )));
            }
        }

        let reference = match input.reference {
            Some(reference) => {
                if Self::find_verified(&self.db, input.merchant_id, &input.provider, &reference)
                    .await?
                    .is_some()
                {
                    return Err(WalletError::AlreadyVerified {
                        provider: input.provider,
                        reference,
                    });
                }
                reference
            }
            None => DepositLifecycle::placeholder_reference(),
        };

        let now = Utc::now();
        let expires_at = DepositLifecycle::expires_at(now, self.policy.deposit_ttl);
        let deposit = wallet_deposits::ActiveModel {
            id: Set(DepositId::new().into_inner()),
            merchant_id: Set(input.merchant_id.into_inner()),
            provider: Set(input.provider),
            reference: Set(reference),
            amount: Set(input.amount),
            receiver_account_id: Set(input.receiver_account_id.map(Into::into)),
            status: Set(WalletDepositStatus::Pending),
            expires_at: Set(Some(expires_at.into())),
            verified_at: Set(None),
            verified_by: Set(None),
            verification_payload: Set(None),
            error_message: Set(None),
            wallet_transaction_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(map_db_err)?;

        info!(
            merchant_id = %input.merchant_id,
            deposit_id = %deposit.id,
            provider = %deposit.provider,
            amount = %deposit.amount,
            expires_at = %expires_at,
            "Pending deposit created"
        );
        Ok(deposit)
    }

    /// PENDING deposits of a merchant, newest first, with a derived expiry
    /// flag. Nothing is written.
    pub async fn pending_for_merchant(
        &self,
        merchant_id: MerchantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingDeposit>, WalletError> {
        let rows = wallet_deposits::Entity::find()
            .filter(wallet_deposits::Column::MerchantId.eq(merchant_id.into_inner()))
            .filter(wallet_deposits::Column::Status.eq(WalletDepositStatus::Pending))
            .order_by_desc(wallet_deposits::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|deposit| PendingDeposit {
                is_expired: deposit.is_expired_at(now),
                deposit,
            })
            .collect())
    }

    /// Finds a deposit by id.
    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: DepositId,
    ) -> Result<wallet_deposits::Model, WalletError> {
        wallet_deposits::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::DepositNotFound(id))
    }

    /// Reads a deposit under `FOR UPDATE`.
    pub async fn lock_by_id(
        txn: &DatabaseTransaction,
        id: DepositId,
    ) -> Result<wallet_deposits::Model, WalletError> {
        wallet_deposits::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::DepositNotFound(id))
    }

    /// The VERIFIED deposit for (merchant, provider, reference), if any.
    pub async fn find_verified<C: ConnectionTrait>(
        conn: &C,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
    ) -> Result<Option<wallet_deposits::Model>, WalletError> {
        by_reference(merchant_id, provider, reference)
            .filter(wallet_deposits::Column::Status.eq(WalletDepositStatus::Verified))
            .one(conn)
            .await
            .map_err(map_db_err)
    }

    /// The deposit recorded under (merchant, provider, reference).
    ///
    /// A VERIFIED row wins; otherwise the newest row is returned.
    pub async fn find_by_reference<C: ConnectionTrait>(
        conn: &C,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
    ) -> Result<Option<wallet_deposits::Model>, WalletError> {
        if let Some(verified) = Self::find_verified(conn, merchant_id, provider, reference).await? {
            return Ok(Some(verified));
        }
        by_reference(merchant_id, provider, reference)
            .order_by_desc(wallet_deposits::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(map_db_err)
    }

    /// PENDING placeholders for (merchant, provider), newest first.
    ///
    /// Rows created with a bank reference are matched by that reference only.
    pub async fn find_pending_candidates<C: ConnectionTrait>(
        conn: &C,
        merchant_id: MerchantId,
        provider: &str,
    ) -> Result<Vec<wallet_deposits::Model>, WalletError> {
        wallet_deposits::Entity::find()
            .filter(wallet_deposits::Column::MerchantId.eq(merchant_id.into_inner()))
            .filter(wallet_deposits::Column::Provider.eq(provider))
            .filter(wallet_deposits::Column::Status.eq(WalletDepositStatus::Pending))
            .filter(wallet_deposits::Column::Reference.starts_with(PLACEHOLDER_PREFIX))
            .order_by_desc(wallet_deposits::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(map_db_err)
    }

    /// Flips a PENDING deposit to EXPIRED.
    ///
    /// Idempotent for rows that are already EXPIRED; any other status is an
    /// invalid transition.
    pub async fn mark_expired<C: ConnectionTrait>(
        conn: &C,
        id: DepositId,
    ) -> Result<wallet_deposits::Model, WalletError> {
        let result = wallet_deposits::Entity::update_many()
            .col_expr(
                wallet_deposits::Column::Status,
                Expr::val(WalletDepositStatus::Expired).as_enum(WalletDepositStatus::name()),
            )
            .col_expr(
                wallet_deposits::Column::ErrorMessage,
                Expr::value("Pending deposit expired before verification"),
            )
            .filter(wallet_deposits::Column::Id.eq(id.into_inner()))
            .filter(wallet_deposits::Column::Status.eq(WalletDepositStatus::Pending))
            .exec(conn)
            .await
            .map_err(map_db_err)?;

        let deposit = Self::find_by_id(conn, id).await?;
        if result.rows_affected == 0 && deposit.status != WalletDepositStatus::Expired {
            return Err(WalletError::InvalidTransition {
                from: deposit.deposit_status(),
                to: DepositStatus::Expired,
            });
        }

        if result.rows_affected > 0 {
            info!(
                merchant_id = %deposit.merchant_id,
                deposit_id = %deposit.id,
                "Pending deposit expired"
            );
        }
        Ok(deposit)
    }

    /// Lists a merchant's deposits, newest first.
    pub async fn list_for_merchant(
        &self,
        merchant_id: MerchantId,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> Result<PageResponse<wallet_deposits::Model>, WalletError> {
        let page = page.clamped(self.policy.history_max_per_page);
        let mut query = wallet_deposits::Entity::find()
            .filter(wallet_deposits::Column::MerchantId.eq(merchant_id.into_inner()));
        if let Some(status) = status {
            query = query.filter(wallet_deposits::Column::Status.eq(WalletDepositStatus::from(status)));
        }

        let total = query.clone().count(&self.db).await.map_err(map_db_err)?;
        let rows = query
            .order_by_desc(wallet_deposits::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(PageResponse::new(rows, page.page, page.per_page, total))
    }
}

fn by_reference(
    merchant_id: MerchantId,
    provider: &str,
    reference: &str,
) -> sea_orm::Select<wallet_deposits::Entity> {
    wallet_deposits::Entity::find()
        .filter(wallet_deposits::Column::MerchantId.eq(merchant_id.into_inner()))
        .filter(wallet_deposits::Column::Provider.eq(provider))
        .filter(wallet_deposits::Column::Reference.eq(reference))
}
