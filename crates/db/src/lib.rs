//! Database layer with `SeaORM` entities, repositories and wallet services.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the wallet tables
//! - Repositories, including the single balance-mutating code path
//! - Services for payment charges, deposit reconciliation and operator actions
//! - Database migrations

pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod retry;
pub mod services;

pub use repositories::{
    DepositRepository, PaymentRepository, ReceiverAccountRepository, WalletRepository,
};
pub use services::{ChargeService, ReconciliationService, VerifyDepositOutcome, WalletAdminService};

use kasa_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
