//! `SeaORM` Entity for payments table (wallet columns only).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub merchant_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub amount: Decimal,
    pub wallet_charged: bool,
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
}

impl Related<super::merchant_wallet_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MerchantWalletAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
