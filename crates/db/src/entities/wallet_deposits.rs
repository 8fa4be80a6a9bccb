//! `SeaORM` Entity for wallet_deposits table.

use chrono::{DateTime, Utc};
use kasa_core::wallet::{DepositLifecycle, DepositStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::WalletDepositStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_deposits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub provider: String,
    pub reference: String,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub amount: Decimal,
    pub receiver_account_id: Option<Uuid>,
    pub status: WalletDepositStatus,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub verified_at: Option<DateTimeWithTimeZone>,
    pub verified_by: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub verification_payload: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub wallet_transaction_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::merchant_wallet_accounts::Entity",
        from = "Column::MerchantId",
        to = "super::merchant_wallet_accounts::Column::MerchantId"
    )]
    MerchantWalletAccounts,
    #[sea_orm(
        belongs_to = "super::wallet_deposit_receiver_accounts::Entity",
        from = "Column::ReceiverAccountId",
        to = "super::wallet_deposit_receiver_accounts::Column::Id"
    )]
    WalletDepositReceiverAccounts,
}

impl Related<super::merchant_wallet_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MerchantWalletAccounts.def()
    }
}

impl Related<super::wallet_deposit_receiver_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletDepositReceiverAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Status in core terms.
    #[must_use]
    pub fn deposit_status(&self) -> DepositStatus {
        self.status.into()
    }

    /// Expiry in UTC.
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at.map(|at| at.with_timezone(&Utc))
    }

    /// True if the row is PENDING and past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == WalletDepositStatus::Pending
            && DepositLifecycle::is_expired(self.expires_at_utc(), now)
    }
}
