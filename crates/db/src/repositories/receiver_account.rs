//! Receiver account repository: the accounts merchants transfer deposits into.

use chrono::Utc;
use kasa_core::wallet::{DepositLifecycle, ReceiverAccountStatus, WalletError};
use kasa_shared::types::ReceiverAccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

use crate::entities::{sea_orm_active_enums::ReceiverStatus, wallet_deposit_receiver_accounts};
use crate::error::{is_unique_violation, map_db_err};

/// Input for configuring a receiver account.
#[derive(Debug, Clone)]
pub struct CreateReceiverAccountInput {
    /// Bank/provider code.
    pub provider: String,
    /// Account number as printed by the bank.
    pub receiver_account: String,
    /// Account holder name.
    pub receiver_name: Option<String>,
    /// Display label.
    pub label: Option<String>,
}

/// Input for editing a receiver account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateReceiverAccountInput {
    /// New account holder name.
    pub receiver_name: Option<String>,
    /// New display label.
    pub label: Option<String>,
}

/// Receiver account repository.
#[derive(Debug, Clone)]
pub struct ReceiverAccountRepository {
    db: DatabaseConnection,
}

impl ReceiverAccountRepository {
    /// Creates a new receiver account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Adds an ACTIVE receiver account.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the (provider, account) pair already
    /// exists or the input is blank.
    pub async fn create(
        &self,
        input: CreateReceiverAccountInput,
    ) -> Result<wallet_deposit_receiver_accounts::Model, WalletError> {
        let provider = DepositLifecycle::normalize_provider(&input.provider)?;
        let receiver_account = input.receiver_account.trim().to_string();
        if receiver_account.is_empty() {
            return Err(WalletError::Validation(
                "receiver account must not be empty".to_string(),
            ));
        }

        let now = Utc::now().into();
        let model = wallet_deposit_receiver_accounts::ActiveModel {
            id: Set(ReceiverAccountId::new().into_inner()),
            provider: Set(provider.clone()),
            receiver_account: Set(receiver_account.clone()),
            receiver_name: Set(trimmed(input.receiver_name)),
            label: Set(trimmed(input.label)),
            status: Set(ReceiverStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, "uq_receiver_accounts_provider_account") {
                WalletError::Validation(format!(
                    "receiver account {receiver_account} is already configured for {provider}"
                ))
            } else {
                map_db_err(err)
            }
        })?;

        info!(
            receiver_account_id = %model.id,
            provider = %model.provider,
            "Receiver account created"
        );
        Ok(model)
    }

    /// Finds a receiver account by id.
    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: ReceiverAccountId,
    ) -> Result<wallet_deposit_receiver_accounts::Model, WalletError> {
        wallet_deposit_receiver_accounts::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::UnknownReceiverAccount(id))
    }

    /// Updates name and label.
    pub async fn update(
        &self,
        id: ReceiverAccountId,
        input: UpdateReceiverAccountInput,
    ) -> Result<wallet_deposit_receiver_accounts::Model, WalletError> {
        let existing = Self::find_by_id(&self.db, id).await?;
        let mut active: wallet_deposit_receiver_accounts::ActiveModel = existing.into();
        if let Some(name) = input.receiver_name {
            active.receiver_name = Set(trimmed(Some(name)));
        }
        if let Some(label) = input.label {
            active.label = Set(trimmed(Some(label)));
        }
        active.update(&self.db).await.map_err(map_db_err)
    }

    /// Activates or deactivates a receiver account.
    pub async fn set_status(
        &self,
        id: ReceiverAccountId,
        status: ReceiverAccountStatus,
    ) -> Result<wallet_deposit_receiver_accounts::Model, WalletError> {
        let existing = Self::find_by_id(&self.db, id).await?;
        let mut active: wallet_deposit_receiver_accounts::ActiveModel = existing.into();
        active.status = Set(status.into());
        let updated = active.update(&self.db).await.map_err(map_db_err)?;

        info!(receiver_account_id = %id, status = %status, "Receiver account status changed");
        Ok(updated)
    }

    /// Lists receiver accounts, optionally narrowed by provider and status.
    pub async fn list(
        &self,
        provider: Option<&str>,
        status: Option<ReceiverAccountStatus>,
    ) -> Result<Vec<wallet_deposit_receiver_accounts::Model>, WalletError> {
        let mut query = wallet_deposit_receiver_accounts::Entity::find();
        if let Some(provider) = provider {
            let provider = DepositLifecycle::normalize_provider(provider)?;
            query = query.filter(wallet_deposit_receiver_accounts::Column::Provider.eq(provider));
        }
        if let Some(status) = status {
            query = query.filter(
                wallet_deposit_receiver_accounts::Column::Status.eq(ReceiverStatus::from(status)),
            );
        }

        query
            .order_by_asc(wallet_deposit_receiver_accounts::Column::Provider)
            .order_by_asc(wallet_deposit_receiver_accounts::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }

    /// ACTIVE receiver accounts for a provider.
    pub async fn find_active_for_provider<C: ConnectionTrait>(
        conn: &C,
        provider: &str,
    ) -> Result<Vec<wallet_deposit_receiver_accounts::Model>, WalletError> {
        wallet_deposit_receiver_accounts::Entity::find()
            .filter(wallet_deposit_receiver_accounts::Column::Provider.eq(provider))
            .filter(wallet_deposit_receiver_accounts::Column::Status.eq(ReceiverStatus::Active))
            .order_by_asc(wallet_deposit_receiver_accounts::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(map_db_err)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
