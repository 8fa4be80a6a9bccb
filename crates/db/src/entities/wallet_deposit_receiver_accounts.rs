//! `SeaORM` Entity for wallet_deposit_receiver_accounts table.

use kasa_core::wallet::ExpectedReceiver;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ReceiverStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_deposit_receiver_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider: String,
    pub receiver_account: String,
    pub receiver_name: Option<String>,
    pub label: Option<String>,
    pub status: ReceiverStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_deposits::Entity")]
    WalletDeposits,
}

impl Related<super::wallet_deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletDeposits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The account as a matching target.
    #[must_use]
    pub fn expected_receiver(&self) -> ExpectedReceiver {
        ExpectedReceiver {
            account: self.receiver_account.clone(),
            name: self.receiver_name.clone(),
        }
    }
}
