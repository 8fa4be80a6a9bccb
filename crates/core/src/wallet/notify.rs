//! Fire-and-forget notification dispatch.
//!
//! Services hand events to [`NotificationDispatcher::dispatch`] after their
//! transaction has committed. Delivery runs on its own task with its own
//! retry schedule; its result never reaches the caller.

use kasa_shared::types::MerchantId;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::policy::RetryPolicy;
use super::ports::{NotificationEvent, Notifier};

/// Spawns notification deliveries.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    /// Hands one event to a background delivery task and returns at once.
    pub fn dispatch(&self, event: NotificationEvent, merchant_id: MerchantId, payload: Value) {
        debug!(event = %event, merchant_id = %merchant_id, "Notification dispatched");
        drop(self.spawn_delivery(event, merchant_id, payload));
    }

    /// Like [`Self::dispatch`], but returns the task handle. It resolves to
    /// whether delivery eventually succeeded.
    pub fn spawn_delivery(
        &self,
        event: NotificationEvent,
        merchant_id: MerchantId,
        payload: Value,
    ) -> JoinHandle<bool> {
        let notifier = Arc::clone(&self.notifier);
        let policy = self.policy.clone();
        tokio::spawn(async move { deliver(notifier.as_ref(), &policy, event, merchant_id, payload).await })
    }
}

/// Delivers `event`, retrying per `policy`. Returns true on success.
pub async fn deliver(
    notifier: &dyn Notifier,
    policy: &RetryPolicy,
    event: NotificationEvent,
    merchant_id: MerchantId,
    payload: Value,
) -> bool {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match notifier.notify(event, merchant_id, payload.clone()).await {
            Ok(()) => {
                debug!(event = %event, merchant_id = %merchant_id, attempt, "Notification delivered");
                return true;
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    event = %event,
                    merchant_id = %merchant_id,
                    attempt,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    event = %event,
                    merchant_id = %merchant_id,
                    attempts = max_attempts,
                    error = %e,
                    "Notification dropped after exhausting retries"
                );
            }
        }
    }

    false
}
