//! Database seeder for Kasa development and testing.
//!
//! Seeds a development merchant wallet with charge settings, an opening
//! balance, receiver accounts and one pending deposit. Safe to run twice.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::Utc;
use kasa_core::wallet::{
    ChargeSettingsInput, ChargeType, CreatePendingDepositInput, LedgerEntryRequest, RelatedEntity,
    WalletPolicy, WalletTransactionType,
};
use kasa_db::repositories::{
    CreateReceiverAccountInput, DepositRepository, ReceiverAccountRepository, WalletRepository,
};
use kasa_shared::types::MerchantId;
use kasa_shared::{AppConfig, LogConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Development merchant (consistent for all seeds)
const DEV_MERCHANT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);

/// (provider, account, holder) for the receiver accounts merchants pay into.
const RECEIVERS: [(&str, &str, &str); 3] = [
    ("CBE", "1000675169601", "Kasa Payments PLC"),
    ("TELEBIRR", "251911000111", "Kasa Payments"),
    ("BOA", "84217753", "Kasa Payments PLC"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log);

    let db = kasa_db::connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let policy = WalletPolicy::from(&config.wallet);
    let merchant_id = MerchantId::from_uuid(DEV_MERCHANT_ID);

    seed_wallet(&db, &policy, merchant_id).await?;
    seed_receivers(&db).await?;
    seed_pending_deposit(&db, &policy, merchant_id).await?;

    info!(merchant_id = %merchant_id, "Seeding complete");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Creates the wallet, enables a 2% charge and credits an opening balance
/// once.
async fn seed_wallet(
    db: &DatabaseConnection,
    policy: &WalletPolicy,
    merchant_id: MerchantId,
) -> anyhow::Result<()> {
    let wallet = WalletRepository::with_policy(db.clone(), policy.clone());
    let account = wallet.create_account(merchant_id).await?;

    wallet
        .update_charge_settings(
            merchant_id,
            ChargeSettingsInput {
                wallet_enabled: true,
                charge_type: Some(ChargeType::Percentage),
                charge_value: Some(dec!(2)),
                min_balance: Some(Decimal::ZERO),
            },
        )
        .await?;

    if account.version == 0 {
        wallet
            .apply_ledger_entry(&LedgerEntryRequest {
                merchant_id,
                transaction_type: WalletTransactionType::Adjustment,
                signed_amount: dec!(1000),
                related: RelatedEntity::None,
                description: "Development opening balance".to_string(),
                metadata: None,
            })
            .await?;
        info!(merchant_id = %merchant_id, "Opening balance credited");
    } else {
        info!(merchant_id = %merchant_id, "Wallet already has entries, skipping opening balance");
    }
    Ok(())
}

async fn seed_receivers(db: &DatabaseConnection) -> anyhow::Result<()> {
    let receivers = ReceiverAccountRepository::new(db.clone());
    for (provider, account, holder) in RECEIVERS {
        let exists = receivers
            .list(Some(provider), None)
            .await?
            .iter()
            .any(|r| r.receiver_account == account);
        if exists {
            info!(provider, "Receiver account already exists, skipping");
            continue;
        }
        receivers
            .create(CreateReceiverAccountInput {
                provider: provider.to_string(),
                receiver_account: account.to_string(),
                receiver_name: Some(holder.to_string()),
                label: Some(format!("{provider} main")),
            })
            .await?;
    }
    Ok(())
}

async fn seed_pending_deposit(
    db: &DatabaseConnection,
    policy: &WalletPolicy,
    merchant_id: MerchantId,
) -> anyhow::Result<()> {
    let deposits = DepositRepository::with_policy(db.clone(), policy.clone());
    let now = Utc::now();
    let live = deposits
        .pending_for_merchant(merchant_id, now)
        .await?
        .into_iter()
        .any(|pending| !pending.is_expired);
    if live {
        info!("Live pending deposit already exists, skipping");
        return Ok(());
    }

    deposits
        .create_pending(CreatePendingDepositInput {
            merchant_id,
            provider: "CBE".to_string(),
            amount: dec!(500),
            receiver_account_id: None,
            reference: None,
        })
        .await?;
    Ok(())
}
