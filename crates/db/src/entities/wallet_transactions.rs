//! `SeaORM` Entity for wallet_transactions table (append-only ledger).

use kasa_core::wallet::LedgerLink;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::WalletTransactionKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub sequence: i64,
    pub transaction_type: WalletTransactionKind,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub balance_before: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub balance_after: Decimal,
    pub payment_id: Option<Uuid>,
    pub deposit_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
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
        belongs_to = "super::wallet_deposits::Entity",
        from = "Column::DepositId",
        to = "super::wallet_deposits::Column::Id"
    )]
    WalletDeposits,
}

impl Related<super::merchant_wallet_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MerchantWalletAccounts.def()
    }
}

impl Related<super::wallet_deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletDeposits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The row's balance arithmetic.
    #[must_use]
    pub const fn link(&self) -> LedgerLink {
        LedgerLink {
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
        }
    }
}
