//! `SeaORM` Entity for merchant_wallet_accounts table.

use kasa_core::wallet::{ChargeConfig, WalletBalance};
use kasa_shared::types::MerchantId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::WalletChargeType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "merchant_wallet_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub merchant_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub balance: Decimal,
    pub wallet_enabled: bool,
    pub charge_type: Option<WalletChargeType>,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))", nullable)]
    pub charge_value: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))", nullable)]
    pub min_balance: Option<Decimal>,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_transactions::Entity")]
    WalletTransactions,
    #[sea_orm(has_many = "super::wallet_deposits::Entity")]
    WalletDeposits,
}

impl Related<super::wallet_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletTransactions.def()
    }
}

impl Related<super::wallet_deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletDeposits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Charge configuration in core terms.
    #[must_use]
    pub fn charge_config(&self) -> ChargeConfig {
        ChargeConfig {
            wallet_enabled: self.wallet_enabled,
            charge_type: self.charge_type.map(Into::into),
            charge_value: self.charge_value,
        }
    }

    /// Merchant-facing balance snapshot.
    #[must_use]
    pub fn to_balance(&self) -> WalletBalance {
        WalletBalance {
            merchant_id: MerchantId::from_uuid(self.merchant_id),
            balance: self.balance,
            charge: self.charge_config(),
            min_balance: self.min_balance,
            updated_at: self.updated_at.with_timezone(&chrono::Utc),
        }
    }
}
