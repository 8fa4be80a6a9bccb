//! `SeaORM` entity definitions for the wallet schema.

pub mod merchant_wallet_accounts;
pub mod payments;
pub mod sea_orm_active_enums;
pub mod wallet_deposit_receiver_accounts;
pub mod wallet_deposits;
pub mod wallet_transactions;
