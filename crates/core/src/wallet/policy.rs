//! Runtime policies built from configuration.

use kasa_shared::config::{NotifierConfig, WalletConfig};
use std::time::Duration;

/// Wallet behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletPolicy {
    /// Lifetime of a pending deposit.
    pub deposit_ttl: chrono::Duration,
    /// Upper bound on a single verifier call.
    pub verifier_timeout: Duration,
    /// Retries of a ledger write after a write conflict.
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries; grows linearly.
    pub conflict_backoff: Duration,
    /// Largest accepted history page size.
    pub history_max_per_page: u32,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        Self::from(&WalletConfig::default())
    }
}

impl From<&WalletConfig> for WalletPolicy {
    fn from(config: &WalletConfig) -> Self {
        Self {
            deposit_ttl: chrono::Duration::minutes(config.deposit_ttl_minutes.max(1)),
            verifier_timeout: Duration::from_secs(config.verifier_timeout_secs.max(1)),
            max_conflict_retries: config.max_conflict_retries,
            conflict_backoff: Duration::from_millis(config.conflict_backoff_ms),
            history_max_per_page: config.history_max_per_page.max(1),
        }
    }
}

impl WalletPolicy {
    /// Delay before conflict retry number `attempt` (1-based).
    #[must_use]
    pub fn conflict_delay(&self, attempt: u32) -> Duration {
        self.conflict_backoff.saturating_mul(attempt)
    }
}

/// Retry schedule for notification delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Multiplier applied after each failed retry.
    pub multiplier: u32,
    /// Delay ceiling.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&NotifierConfig::default())
    }
}

impl From<&NotifierConfig> for RetryPolicy {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// No retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
