//! Postgres enum mappings and conversions to the core wallet enums.

use kasa_core::wallet::{ChargeType, DepositStatus, ReceiverAccountStatus, WalletTransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_charge_type")]
pub enum WalletChargeType {
    #[sea_orm(string_value = "PERCENTAGE")]
    Percentage,
    #[sea_orm(string_value = "FIXED")]
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_transaction_type")]
pub enum WalletTransactionKind {
    #[sea_orm(string_value = "CHARGE")]
    Charge,
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_deposit_status")]
pub enum WalletDepositStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "VERIFIED")]
    Verified,
    #[sea_orm(string_value = "UNVERIFIED")]
    Unverified,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "receiver_account_status")]
pub enum ReceiverStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
}

impl From<ChargeType> for WalletChargeType {
    fn from(value: ChargeType) -> Self {
        match value {
            ChargeType::Percentage => Self::Percentage,
            ChargeType::Fixed => Self::Fixed,
        }
    }
}

impl From<WalletChargeType> for ChargeType {
    fn from(value: WalletChargeType) -> Self {
        match value {
            WalletChargeType::Percentage => Self::Percentage,
            WalletChargeType::Fixed => Self::Fixed,
        }
    }
}

impl From<WalletTransactionType> for WalletTransactionKind {
    fn from(value: WalletTransactionType) -> Self {
        match value {
            WalletTransactionType::Charge => Self::Charge,
            WalletTransactionType::Deposit => Self::Deposit,
            WalletTransactionType::Adjustment => Self::Adjustment,
        }
    }
}

impl From<WalletTransactionKind> for WalletTransactionType {
    fn from(value: WalletTransactionKind) -> Self {
        match value {
            WalletTransactionKind::Charge => Self::Charge,
            WalletTransactionKind::Deposit => Self::Deposit,
            WalletTransactionKind::Adjustment => Self::Adjustment,
        }
    }
}

impl From<DepositStatus> for WalletDepositStatus {
    fn from(value: DepositStatus) -> Self {
        match value {
            DepositStatus::Pending => Self::Pending,
            DepositStatus::Verified => Self::Verified,
            DepositStatus::Unverified => Self::Unverified,
            DepositStatus::Expired => Self::Expired,
        }
    }
}

impl From<WalletDepositStatus> for DepositStatus {
    fn from(value: WalletDepositStatus) -> Self {
        match value {
            WalletDepositStatus::Pending => Self::Pending,
            WalletDepositStatus::Verified => Self::Verified,
            WalletDepositStatus::Unverified => Self::Unverified,
            WalletDepositStatus::Expired => Self::Expired,
        }
    }
}

impl From<ReceiverAccountStatus> for ReceiverStatus {
    fn from(value: ReceiverAccountStatus) -> Self {
        match value {
            ReceiverAccountStatus::Active => Self::Active,
            ReceiverAccountStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<ReceiverStatus> for ReceiverAccountStatus {
    fn from(value: ReceiverStatus) -> Self {
        match value {
            ReceiverStatus::Active => Self::Active,
            ReceiverStatus::Inactive => Self::Inactive,
        }
    }
}
