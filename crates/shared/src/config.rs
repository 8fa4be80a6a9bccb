//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Wallet ledger and reconciliation settings.
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Notification dispatch settings.
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Wallet configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Lifetime of a pending deposit placeholder, in minutes.
    #[serde(default = "default_deposit_ttl_minutes")]
    pub deposit_ttl_minutes: i64,
    /// Upper bound on a single verifier call, in seconds.
    #[serde(default = "default_verifier_timeout_secs")]
    pub verifier_timeout_secs: u64,
    /// How many times a ledger write is retried after a write conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries, in milliseconds.
    #[serde(default = "default_conflict_backoff_ms")]
    pub conflict_backoff_ms: u64,
    /// Largest page size accepted for transaction history.
    #[serde(default = "default_history_max_per_page")]
    pub history_max_per_page: u32,
}

fn default_deposit_ttl_minutes() -> i64 {
    30
}

fn default_verifier_timeout_secs() -> u64 {
    15
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_conflict_backoff_ms() -> u64 {
    25
}

fn default_history_max_per_page() -> u32 {
    100
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            deposit_ttl_minutes: default_deposit_ttl_minutes(),
            verifier_timeout_secs: default_verifier_timeout_secs(),
            max_conflict_retries: default_max_conflict_retries(),
            conflict_backoff_ms: default_conflict_backoff_ms(),
            history_max_per_page: default_history_max_per_page(),
        }
    }
}

/// Notifier retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Total delivery attempts per notification, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Integer multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Ceiling for the retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> u32 {
    2
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "kasa=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KASA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_defaults() {
        let wallet = WalletConfig::default();
        assert_eq!(wallet.deposit_ttl_minutes, 30);
        assert_eq!(wallet.verifier_timeout_secs, 15);
        assert_eq!(wallet.max_conflict_retries, 3);
        assert_eq!(wallet.history_max_per_page, 100);
    }

    #[test]
    fn test_notifier_defaults() {
        let notifier = NotifierConfig::default();
        assert_eq!(notifier.max_attempts, 3);
        assert_eq!(notifier.backoff_multiplier, 2);
        assert!(notifier.initial_backoff_ms <= notifier.max_backoff_ms);
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("KASA__DATABASE__URL", Some("postgres://localhost/kasa_test")),
                ("KASA__WALLET__DEPOSIT_TTL_MINUTES", Some("45")),
                ("RUN_MODE", Some("does-not-exist")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/kasa_test");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.wallet.deposit_ttl_minutes, 45);
                assert_eq!(config.wallet.verifier_timeout_secs, 15);
                assert!(!config.log.json);
            },
        );
    }

    #[test]
    fn test_load_requires_database_url() {
        temp_env::with_vars(
            [
                ("KASA__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("does-not-exist")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
