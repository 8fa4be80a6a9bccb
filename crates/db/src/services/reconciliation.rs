//! ReconciliationEngine: verifies merchant bank deposits and credits them.
//!
//! Flow of [`ReconciliationService::verify_deposit`]:
//! 1. a VERIFIED row for (merchant, provider, reference) is a conflict;
//! 2. otherwise pick the row to fill: the exact-reference row, the requested
//!    placeholder, or a PENDING placeholder for the provider (expired ones
//!    are flipped to EXPIRED on the way);
//! 3. resolve the expected receiver accounts;
//! 4. ask the verifier, bounded by the policy timeout;
//! 5. decide VERIFIED or UNVERIFIED and persist, crediting the wallet in the
//!    same transaction when verified;
//! 6. notify after commit.
//!
//! A placeholder is only ever filled by a verified reference. Failed attempts
//! are recorded on a row of their own carrying the attempted reference, so
//! the placeholder keeps its receiver pin and its expiry.

use chrono::{DateTime, Utc};
use kasa_core::wallet::{
    DepositLifecycle, DepositStatus, ExpectedReceiver, LedgerEntryRequest, NotificationDispatcher,
    NotificationEvent, RelatedEntity, VerificationDecision, VerificationFailure,
    VerifyDepositRequest, Verifier, VerifierResult, WalletError, WalletPolicy,
    WalletTransactionType, evaluate, receiver_matches,
};
use kasa_shared::types::{DepositId, MerchantId, ReceiverAccountId, WalletTransactionId, round_minor};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::{
    merchant_wallet_accounts, sea_orm_active_enums::WalletDepositStatus,
    wallet_deposit_receiver_accounts, wallet_deposits,
};
use crate::error::map_db_err;
use crate::repositories::{DepositRepository, ReceiverAccountRepository, WalletRepository};
use crate::retry::retry_on_conflict;

/// Actor recorded on deposits verified through the verifier.
const VERIFIER_ACTOR: &str = "system:verifier";

/// Result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyDepositOutcome {
    /// VERIFIED or UNVERIFIED.
    pub status: DepositStatus,
    /// Amount reported by the verifier, if any.
    pub amount: Option<Decimal>,
    /// The deposit row as persisted.
    pub deposit: wallet_deposits::Model,
    /// Ledger row of the credit, when verified.
    pub transaction_id: Option<WalletTransactionId>,
    /// Wallet balance after the credit, when verified.
    pub balance_after: Option<Decimal>,
    /// Why verification failed, when unverified.
    pub message: Option<String>,
}

impl VerifyDepositOutcome {
    /// Returns true if the deposit was credited.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == DepositStatus::Verified
    }
}

/// Which deposit row a verification writes to.
#[derive(Debug)]
enum Target {
    /// A known row: the exact-reference row or a chosen placeholder.
    Existing(wallet_deposits::Model),
    /// Several live placeholders; chosen by amount once the verifier answered.
    /// `fallback` is an earlier failed attempt for the same reference.
    Ambiguous {
        candidates: Vec<wallet_deposits::Model>,
        fallback: Option<wallet_deposits::Model>,
    },
    /// No row yet; one is created.
    New,
}

/// What the verifier said and what was decided from it.
struct Verdict {
    decision: VerificationDecision,
    payload: Option<Value>,
    matched_receiver: Option<ReceiverAccountId>,
}

/// Reconciles merchant deposits against the external verifier.
#[derive(Clone)]
pub struct ReconciliationService {
    db: DatabaseConnection,
    verifier: Arc<dyn Verifier>,
    dispatcher: NotificationDispatcher,
    policy: WalletPolicy,
}

impl std::fmt::Debug for ReconciliationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ReconciliationService {
    /// Creates a reconciliation service.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        verifier: Arc<dyn Verifier>,
        dispatcher: NotificationDispatcher,
        policy: WalletPolicy,
    ) -> Self {
        Self {
            db,
            verifier,
            dispatcher,
            policy,
        }
    }

    /// Verifies a bank reference and credits the wallet on success.
    ///
    /// # Errors
    ///
    /// - `AlreadyVerified` if the reference was credited before (nothing changes)
    /// - `DepositExpired` if the placeholder outlived its TTL (it is flipped to EXPIRED)
    /// - `ReceiverAccountNotFound` if no receiver account is configured for the provider
    /// - `MerchantNotFound`, `DepositNotFound`, `Validation` for bad input
    ///
    /// A failed check is not an error: it is persisted and returned as an
    /// UNVERIFIED outcome.
    pub async fn verify_deposit(
        &self,
        request: VerifyDepositRequest,
    ) -> Result<VerifyDepositOutcome, WalletError> {
        let provider = DepositLifecycle::normalize_provider(&request.provider)?;
        let reference = DepositLifecycle::normalize_reference(&request.reference)?;
        if DepositLifecycle::is_placeholder_reference(&reference) {
            return Err(WalletError::Validation(
                "a placeholder reference cannot be verified; use the bank reference".to_string(),
            ));
        }
        let merchant_id = request.merchant_id;

        merchant_wallet_accounts::Entity::find_by_id(merchant_id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(WalletError::MerchantNotFound(merchant_id))?;

        let now = Utc::now();
        let target = self
            .resolve_target(merchant_id, &provider, &reference, request.deposit_id, now)
            .await?;
        let receivers = self.expected_receivers(&target, &provider).await?;
        let verdict = self.consult_verifier(&provider, &reference, &receivers).await;

        let chosen = match target {
            Target::Existing(deposit) => Some(deposit),
            Target::Ambiguous {
                candidates,
                fallback,
            } => pick_by_amount(candidates, verdict.decision.amount).or(fallback),
            Target::New => None,
        };

        let outcome = retry_on_conflict(&self.policy, "verify_deposit", || {
            self.persist(merchant_id, &provider, &reference, chosen.as_ref(), &verdict)
        })
        .await?;

        self.notify_outcome(merchant_id, &outcome);
        Ok(outcome)
    }

    /// Steps 1 and 2: conflict check and row selection.
    async fn resolve_target(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
        deposit_id: Option<DepositId>,
        now: DateTime<Utc>,
    ) -> Result<Target, WalletError> {
        if let Some(deposit_id) = deposit_id {
            return self
                .requested_target(merchant_id, provider, reference, deposit_id, now)
                .await;
        }

        if let Some(existing) =
            DepositRepository::find_by_reference(&self.db, merchant_id, provider, reference).await?
        {
            return match existing.status {
                WalletDepositStatus::Verified => Err(WalletError::AlreadyVerified {
                    provider: provider.to_string(),
                    reference: reference.to_string(),
                }),
                WalletDepositStatus::Expired => Err(expired_error(&existing, now)),
                WalletDepositStatus::Pending if existing.is_expired_at(now) => {
                    Err(self.expire(&existing, now).await)
                }
                WalletDepositStatus::Pending => Ok(Target::Existing(existing)),
                // An earlier failed attempt. A live placeholder still takes the credit.
                WalletDepositStatus::Unverified => {
                    match self.placeholder_target(merchant_id, provider, now).await {
                        Ok(Target::Existing(placeholder)) => Ok(Target::Existing(placeholder)),
                        Ok(Target::Ambiguous { candidates, .. }) => Ok(Target::Ambiguous {
                            candidates,
                            fallback: Some(existing),
                        }),
                        Ok(Target::New) | Err(WalletError::DepositExpired { .. }) => {
                            Ok(Target::Existing(existing))
                        }
                        Err(err) => Err(err),
                    }
                }
            };
        }

        self.placeholder_target(merchant_id, provider, now).await
    }

    /// The placeholder named in the request. It must belong to the merchant
    /// and provider and still be open.
    async fn requested_target(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
        deposit_id: DepositId,
        now: DateTime<Utc>,
    ) -> Result<Target, WalletError> {
        if DepositRepository::find_verified(&self.db, merchant_id, provider, reference)
            .await?
            .is_some()
        {
            return Err(WalletError::AlreadyVerified {
                provider: provider.to_string(),
                reference: reference.to_string(),
            });
        }

        let deposit = DepositRepository::find_by_id(&self.db, deposit_id).await?;
        if deposit.merchant_id != merchant_id.into_inner() || deposit.provider != provider {
            return Err(WalletError::DepositNotFound(deposit_id));
        }
        match deposit.status {
            WalletDepositStatus::Pending if deposit.is_expired_at(now) => {
                Err(self.expire(&deposit, now).await)
            }
            WalletDepositStatus::Pending | WalletDepositStatus::Unverified => {
                Ok(Target::Existing(deposit))
            }
            WalletDepositStatus::Expired => Err(expired_error(&deposit, now)),
            // Filled by another reference; this transfer gets its own row.
            WalletDepositStatus::Verified => Ok(Target::New),
        }
    }

    /// Live PENDING placeholders for the provider. Expired ones are flipped
    /// on the way.
    async fn placeholder_target(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Target, WalletError> {
        let candidates =
            DepositRepository::find_pending_candidates(&self.db, merchant_id, provider).await?;
        let (expired, mut live): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|deposit| deposit.is_expired_at(now));

        let mut last_expiry = None;
        for deposit in &expired {
            last_expiry = Some(self.expire(deposit, now).await);
        }

        match (live.len(), last_expiry) {
            (0, Some(err)) => Err(err),
            (0, None) => Ok(Target::New),
            (1, _) => Ok(Target::Existing(live.remove(0))),
            _ => Ok(Target::Ambiguous {
                candidates: live,
                fallback: None,
            }),
        }
    }

    /// Flips an expired placeholder and returns the error to report.
    async fn expire(&self, deposit: &wallet_deposits::Model, now: DateTime<Utc>) -> WalletError {
        let deposit_id = DepositId::from_uuid(deposit.id);
        match DepositRepository::mark_expired(&self.db, deposit_id).await {
            Ok(expired) => {
                self.dispatcher.dispatch(
                    NotificationEvent::DepositExpired,
                    MerchantId::from_uuid(expired.merchant_id),
                    json!({
                        "deposit_id": expired.id,
                        "provider": expired.provider,
                        "amount": expired.amount,
                        "expires_at": expired.expires_at,
                    }),
                );
                expired_error(&expired, now)
            }
            Err(err) => err,
        }
    }

    /// Step 3: the accounts the transfer must have landed in.
    async fn expected_receivers(
        &self,
        target: &Target,
        provider: &str,
    ) -> Result<Vec<wallet_deposit_receiver_accounts::Model>, WalletError> {
        if let Target::Existing(wallet_deposits::Model {
            receiver_account_id: Some(receiver_id),
            ..
        }) = target
        {
            let receiver =
                ReceiverAccountRepository::find_by_id(&self.db, ReceiverAccountId::from_uuid(*receiver_id))
                    .await?;
            return Ok(vec![receiver]);
        }

        let mut receivers =
            ReceiverAccountRepository::find_active_for_provider(&self.db, provider).await?;

        if let Target::Ambiguous {
            candidates,
            fallback,
        } = target
        {
            let pinned = candidates.iter().chain(fallback).filter_map(|d| d.receiver_account_id);
            for receiver_id in pinned {
                if !receivers.iter().any(|r| r.id == receiver_id) {
                    receivers.push(
                        ReceiverAccountRepository::find_by_id(
                            &self.db,
                            ReceiverAccountId::from_uuid(receiver_id),
                        )
                        .await?,
                    );
                }
            }
        }

        if receivers.is_empty() {
            return Err(WalletError::ReceiverAccountNotFound(format!(
                "no active receiver account configured for {provider}"
            )));
        }
        Ok(receivers)
    }

    /// Steps 4 and 5: call the verifier and decide.
    async fn consult_verifier(
        &self,
        provider: &str,
        reference: &str,
        receivers: &[wallet_deposit_receiver_accounts::Model],
    ) -> Verdict {
        let timeout = self.policy.verifier_timeout;
        let call = self.verifier.verify(provider, reference);

        let result: VerifierResult = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(provider, reference, error = %err, "Verifier call failed");
                return Verdict {
                    decision: VerificationDecision::unverified(
                        VerificationFailure::VerifierUnavailable {
                            detail: err.to_string(),
                        },
                        None,
                    ),
                    payload: None,
                    matched_receiver: None,
                };
            }
            Err(_) => {
                warn!(provider, reference, timeout_secs = timeout.as_secs(), "Verifier call timed out");
                return Verdict {
                    decision: VerificationDecision::unverified(
                        VerificationFailure::VerifierTimedOut {
                            timeout_secs: timeout.as_secs(),
                        },
                        None,
                    ),
                    payload: None,
                    matched_receiver: None,
                };
            }
        };

        let expected: Vec<ExpectedReceiver> = receivers
            .iter()
            .map(wallet_deposit_receiver_accounts::Model::expected_receiver)
            .collect();
        let decision = evaluate(&result, &expected);
        let matched_receiver = receivers
            .iter()
            .find(|receiver| {
                decision.is_verified()
                    && receiver_matches(
                        result.receiver_account.as_deref(),
                        result.receiver_name.as_deref(),
                        &receiver.expected_receiver(),
                    )
            })
            .map(|receiver| ReceiverAccountId::from_uuid(receiver.id));

        Verdict {
            decision,
            payload: Some(result.raw),
            matched_receiver,
        }
    }

    /// Writes the verdict, and the ledger credit when verified, in one
    /// transaction.
    async fn persist(
        &self,
        merchant_id: MerchantId,
        provider: &str,
        reference: &str,
        chosen: Option<&wallet_deposits::Model>,
        verdict: &Verdict,
    ) -> Result<VerifyDepositOutcome, WalletError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let now = Utc::now();
        let decision = &verdict.decision;
        let status = decision.status;

        if DepositRepository::find_verified(&txn, merchant_id, provider, reference)
            .await?
            .is_some()
        {
            return Err(WalletError::AlreadyVerified {
                provider: provider.to_string(),
                reference: reference.to_string(),
            });
        }

        let existing = match chosen {
            Some(deposit) => Self::lock_fillable(&txn, deposit, provider, reference, now).await?,
            None => None,
        };
        if let Some(locked) = &existing {
            DepositLifecycle::transition(locked.deposit_status(), status)?;
        }

        // A failed attempt never consumes a placeholder.
        let (existing, placeholder) = match existing {
            Some(locked)
                if !decision.is_verified()
                    && DepositLifecycle::is_placeholder_reference(&locked.reference) =>
            {
                let earlier =
                    DepositRepository::find_by_reference(&txn, merchant_id, provider, reference)
                        .await?;
                let attempt = match earlier {
                    Some(row) => {
                        let row = DepositRepository::lock_by_id(&txn, DepositId::from_uuid(row.id))
                            .await?;
                        row.deposit_status().can_transition_to(status).then_some(row)
                    }
                    None => None,
                };
                (attempt, Some(locked))
            }
            other => (other, None),
        };

        let reported = decision.amount.map(round_minor);
        let credit = decision.credit_amount().map(round_minor);
        let amount = credit
            .or_else(|| existing.as_ref().map(|d| d.amount))
            .or_else(|| reported.filter(|a| *a > Decimal::ZERO))
            .or_else(|| placeholder.as_ref().map(|d| d.amount))
            .unwrap_or(Decimal::ZERO);
        let pinned_receiver = placeholder
            .as_ref()
            .and_then(|d| d.receiver_account_id)
            .or(verdict.matched_receiver.map(Into::into));
        let verified_at = decision.is_verified().then(|| now.into());
        let verified_by = decision.is_verified().then(|| VERIFIER_ACTOR.to_string());

        let deposit = match existing {
            Some(locked) => {
                let receiver_account_id = locked.receiver_account_id;
                let mut active: wallet_deposits::ActiveModel = locked.into();
                active.reference = Set(reference.to_string());
                active.amount = Set(amount);
                active.status = Set(status.into());
                active.receiver_account_id = Set(receiver_account_id.or(pinned_receiver));
                active.verified_at = Set(verified_at);
                active.verified_by = Set(verified_by);
                active.verification_payload = Set(verdict.payload.clone());
                active.error_message = Set(decision.error_message());
                active.update(&txn).await.map_err(map_db_err)?
            }
            None => wallet_deposits::ActiveModel {
                id: Set(DepositId::new().into_inner()),
                merchant_id: Set(merchant_id.into_inner()),
                provider: Set(provider.to_string()),
                reference: Set(reference.to_string()),
                amount: Set(amount),
                receiver_account_id: Set(pinned_receiver),
                status: Set(status.into()),
                expires_at: Set(None),
                verified_at: Set(verified_at),
                verified_by: Set(verified_by),
                verification_payload: Set(verdict.payload.clone()),
                error_message: Set(decision.error_message()),
                wallet_transaction_id: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await
            .map_err(map_db_err)?,
        };

        let Some(credit) = credit else {
            txn.commit().await.map_err(map_db_err)?;
            info!(
                merchant_id = %merchant_id,
                deposit_id = %deposit.id,
                provider,
                reference,
                reason = ?decision.error_message(),
                "Deposit unverified"
            );
            return Ok(VerifyDepositOutcome {
                status,
                amount: reported,
                message: deposit.error_message.clone(),
                deposit,
                transaction_id: None,
                balance_after: None,
            });
        };

        let entry = WalletRepository::apply_ledger_entry_in(
            &txn,
            &LedgerEntryRequest {
                merchant_id,
                transaction_type: WalletTransactionType::Deposit,
                signed_amount: credit,
                related: RelatedEntity::Deposit(DepositId::from_uuid(deposit.id)),
                description: format!("Deposit {provider} {reference}"),
                metadata: Some(json!({ "provider": provider, "reference": reference })),
            },
        )
        .await?;

        let mut active: wallet_deposits::ActiveModel = deposit.into();
        active.wallet_transaction_id = Set(Some(entry.id));
        let deposit = active.update(&txn).await.map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)?;

        info!(
            merchant_id = %merchant_id,
            deposit_id = %deposit.id,
            provider,
            reference,
            amount = %credit,
            balance_after = %entry.balance_after,
            "Deposit verified"
        );

        Ok(VerifyDepositOutcome {
            status,
            amount: Some(credit),
            deposit,
            transaction_id: Some(WalletTransactionId::from_uuid(entry.id)),
            balance_after: Some(entry.balance_after),
            message: None,
        })
    }

    /// Locks the chosen row and checks it can still take this reference.
    ///
    /// `None` means another reference filled it in the meantime and the
    /// transfer needs a row of its own.
    async fn lock_fillable(
        txn: &DatabaseTransaction,
        deposit: &wallet_deposits::Model,
        provider: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<wallet_deposits::Model>, WalletError> {
        let locked = DepositRepository::lock_by_id(txn, DepositId::from_uuid(deposit.id)).await?;
        match locked.status {
            WalletDepositStatus::Expired => Err(expired_error(&locked, now)),
            WalletDepositStatus::Verified if locked.reference == reference => {
                Err(WalletError::AlreadyVerified {
                    provider: provider.to_string(),
                    reference: reference.to_string(),
                })
            }
            WalletDepositStatus::Verified => {
                debug!(
                    deposit_id = %locked.id,
                    filled_with = %locked.reference,
                    reference,
                    "Placeholder taken by another reference"
                );
                Ok(None)
            }
            WalletDepositStatus::Pending | WalletDepositStatus::Unverified => Ok(Some(locked)),
        }
    }

    fn notify_outcome(&self, merchant_id: MerchantId, outcome: &VerifyDepositOutcome) {
        let event = if outcome.is_verified() {
            NotificationEvent::DepositVerified
        } else {
            NotificationEvent::DepositUnverified
        };
        self.dispatcher.dispatch(
            event,
            merchant_id,
            json!({
                "deposit_id": outcome.deposit.id,
                "provider": outcome.deposit.provider,
                "reference": outcome.deposit.reference,
                "status": outcome.status,
                "amount": outcome.amount,
                "transaction_id": outcome.transaction_id,
                "balance_after": outcome.balance_after,
                "message": outcome.message,
            }),
        );
    }
}

pub(super) fn expired_error(deposit: &wallet_deposits::Model, now: DateTime<Utc>) -> WalletError {
    WalletError::DepositExpired {
        deposit_id: DepositId::from_uuid(deposit.id),
        expired_at: deposit.expires_at_utc().unwrap_or(now),
    }
}

/// Among several placeholders (newest first), the newest whose amount
/// equals the reported amount.
fn pick_by_amount(
    candidates: Vec<wallet_deposits::Model>,
    reported: Option<Decimal>,
) -> Option<wallet_deposits::Model> {
    let reported = round_minor(reported?);
    candidates
        .into_iter()
        .find(|deposit| round_minor(deposit.amount) == reported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn placeholder(amount: Decimal) -> wallet_deposits::Model {
        let now = Utc::now().into();
        wallet_deposits::Model {
            id: DepositId::new().into_inner(),
            merchant_id: MerchantId::new().into_inner(),
            provider: "CBE".to_string(),
            reference: DepositLifecycle::placeholder_reference(),
            amount,
            receiver_account_id: None,
            status: WalletDepositStatus::Pending,
            expires_at: Some(now),
            verified_at: None,
            verified_by: None,
            verification_payload: None,
            error_message: None,
            wallet_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pick_by_amount_prefers_newest_match() {
        let newest = placeholder(dec!(500));
        let older = placeholder(dec!(500.00));
        let other = placeholder(dec!(200));
        let picked = pick_by_amount(
            vec![other, newest.clone(), older],
            Some(dec!(500.001)),
        );
        assert_eq!(picked.map(|d| d.id), Some(newest.id));
    }

    #[test]
    fn test_pick_by_amount_without_match_or_amount() {
        let candidates = vec![placeholder(dec!(100)), placeholder(dec!(200))];
        assert!(pick_by_amount(candidates.clone(), Some(dec!(300))).is_none());
        assert!(pick_by_amount(candidates, None).is_none());
    }

    #[test]
    fn test_expired_error_carries_expiry() {
        let deposit = placeholder(dec!(100));
        let err = expired_error(&deposit, Utc::now());
        match err {
            WalletError::DepositExpired { deposit_id, expired_at } => {
                assert_eq!(deposit_id.into_inner(), deposit.id);
                assert_eq!(Some(expired_at), deposit.expires_at_utc());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
