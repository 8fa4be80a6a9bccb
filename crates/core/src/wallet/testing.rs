//! In-memory collaborator doubles for integration tests and local tooling.

use async_trait::async_trait;
use kasa_shared::types::MerchantId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::ports::{NotificationEvent, Notifier, NotifyError, Verifier, VerifierError};
use super::verification::VerifierResult;

/// Verifier answering from a fixed table.
///
/// Unknown references come back as not found. An optional delay lets tests
/// exercise the verifier timeout.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    results: Mutex<HashMap<(String, String), Result<VerifierResult, VerifierError>>>,
    delay: Option<Duration>,
}

impl StaticVerifier {
    /// Empty verifier: every reference is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that sleeps before answering.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            results: Mutex::default(),
            delay: Some(delay),
        }
    }

    /// Registers the answer for (provider, reference).
    pub fn insert(
        &self,
        provider: &str,
        reference: &str,
        result: Result<VerifierResult, VerifierError>,
    ) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((provider.to_string(), reference.to_string()), result);
    }
}

#[async_trait]
impl Verifier for StaticVerifier {
    async fn verify(&self, provider: &str, reference: &str) -> Result<VerifierResult, VerifierError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = (provider.to_string(), reference.to_string());
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok(VerifierResult::not_found("unknown reference", Value::Null)))
    }
}

/// One delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNotification {
    /// Event type.
    pub event: NotificationEvent,
    /// Recipient merchant.
    pub merchant_id: MerchantId,
    /// Event body.
    pub payload: Value,
}

/// Notifier that remembers what it was asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<RecordedNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Notifier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that rejects every delivery but still records the attempt.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::default(),
            fail: true,
        }
    }

    /// Snapshot of recorded notifications, oldest first.
    pub fn delivered(&self) -> Vec<RecordedNotification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one type.
    pub fn events_of(&self, event: NotificationEvent) -> Vec<RecordedNotification> {
        self.delivered()
            .into_iter()
            .filter(|n| n.event == event)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        merchant_id: MerchantId,
        payload: Value,
    ) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedNotification {
                event,
                merchant_id,
                payload,
            });
        if self.fail {
            Err(NotifyError("recording notifier set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}
