//! Retry-on-conflict for wallet write units.

use kasa_core::wallet::{WalletError, WalletPolicy};
use std::future::Future;
use tracing::warn;

/// Runs `unit` until it succeeds, fails with a non-retryable error, or the
/// policy's conflict retries are used up.
///
/// `unit` must open and commit its own database transaction so that each
/// attempt re-reads committed state.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &WalletPolicy,
    operation: &'static str,
    mut unit: F,
) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match unit().await {
            Err(err) if err.is_retryable() && attempt < policy.max_conflict_retries => {
                attempt += 1;
                let delay = policy.conflict_delay(attempt);
                warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_conflict_retries,
                    "Write conflict, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32) -> WalletPolicy {
        WalletPolicy {
            max_conflict_retries: retries,
            ..WalletPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_conflicts_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = retry_on_conflict(&policy(3), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(WalletError::ConcurrentModification)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(&policy(2), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WalletError::ConcurrentModification)
        })
        .await;

        assert!(matches!(result, Err(WalletError::ConcurrentModification)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(&policy(5), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WalletError::Validation("bad".to_string()))
        })
        .await;

        assert!(matches!(result, Err(WalletError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
