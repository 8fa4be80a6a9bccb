//! Verifier results and the reconciliation decision.
//!
//! Verifier output is untrusted and provider-specific. It is captured as a
//! [`VerifierResult`] whose fields are explicitly optional; the decision
//! never assumes a field is present.

use kasa_shared::types::round_minor;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;

use super::matching::{ExpectedReceiver, receiver_matches};
use super::types::DepositStatus;

/// What the external verifier reported for one (provider, reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierResult {
    /// The verifier acknowledged the reference.
    pub success: bool,
    /// Transferred amount, if reported and parseable.
    pub amount: Option<Decimal>,
    /// Account the transfer was credited to, possibly masked.
    pub receiver_account: Option<String>,
    /// Name on the credited account.
    pub receiver_name: Option<String>,
    /// Verifier-specific message, if any.
    pub message: Option<String>,
    /// The untouched verifier payload, stored for audit.
    pub raw: Value,
}

const AMOUNT_KEYS: [&str; 4] = ["amount", "transferredAmount", "transferred_amount", "totalAmount"];
const ACCOUNT_KEYS: [&str; 5] = [
    "receiverAccount",
    "receiver_account",
    "creditedAccount",
    "credited_account",
    "receiverAccountNumber",
];
const NAME_KEYS: [&str; 5] = [
    "receiverName",
    "receiver_name",
    "creditedName",
    "credited_party_name",
    "receiverAccountName",
];
const MESSAGE_KEYS: [&str; 3] = ["message", "error", "reason"];

impl VerifierResult {
    /// A result for a reference the verifier could not find.
    #[must_use]
    pub fn not_found(message: impl Into<String>, raw: Value) -> Self {
        Self {
            success: false,
            amount: None,
            receiver_account: None,
            receiver_name: None,
            message: Some(message.into()),
            raw,
        }
    }

    /// Reads a loosely-typed verifier payload.
    ///
    /// Fields are looked up at the top level and under `data`, using the
    /// key spellings verifiers are known to use. Anything missing or
    /// unparseable becomes `None`; `success` defaults to false.
    #[must_use]
    pub fn from_raw(raw: Value) -> Self {
        let success = lookup(&raw, &["success", "verified"])
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let amount = lookup(&raw, &AMOUNT_KEYS).and_then(parse_amount);
        let receiver_account = lookup(&raw, &ACCOUNT_KEYS).and_then(non_empty_string);
        let receiver_name = lookup(&raw, &NAME_KEYS).and_then(non_empty_string);
        let message = lookup(&raw, &MESSAGE_KEYS).and_then(non_empty_string);

        Self {
            success,
            amount,
            receiver_account,
            receiver_name,
            message,
            raw,
        }
    }
}

fn lookup<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let scopes = [Some(raw), raw.get("data")];
    scopes.into_iter().flatten().find_map(|scope| {
        keys.iter()
            .find_map(|key| scope.get(*key).filter(|v| !v.is_null()))
    })
}

fn non_empty_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// One numeric token: optional sign, digits with optional comma grouping,
/// optional fraction.
static AMOUNT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("amount token pattern is valid")
});

/// Comma grouping must be in threes.
static GROUPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d{1,3}(?:,\d{3})*(?:\.\d+)?$").expect("grouping pattern is valid")
});

/// Parses an amount from a JSON number or a string such as `"ETB 1,500.00"`.
///
/// A string must contain exactly one numeric token. Several tokens
/// (`"1.500,00"`, `"500 on 2024-01-02"`) or malformed grouping (`"1,50"`)
/// yield `None`.
#[must_use]
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let mut tokens = AMOUNT_TOKEN.find_iter(s);
            let token = tokens.next()?.as_str();
            if tokens.next().is_some() {
                return None;
            }
            if token.contains(',') && !GROUPED.is_match(token) {
                return None;
            }
            token.replace(',', "")
        }
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Which check a verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// The verifier did not acknowledge the reference.
    ReferenceNotFound {
        /// Verifier message, if any.
        detail: Option<String>,
    },
    /// The verifier reported no usable amount.
    MissingAmount,
    /// The verifier reported a zero or negative amount.
    NonPositiveAmount,
    /// The transfer went to a different account.
    ReceiverMismatch {
        /// Account the verifier reported.
        reported: Option<String>,
    },
    /// The verifier call errored.
    VerifierUnavailable {
        /// Error text.
        detail: String,
    },
    /// The verifier call exceeded its timeout.
    VerifierTimedOut {
        /// Timeout that elapsed, in seconds.
        timeout_secs: u64,
    },
}

impl VerificationFailure {
    /// Message stored as the deposit's `error_message`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ReferenceNotFound { detail: Some(detail) } => {
                format!("Reference not found by verifier: {detail}")
            }
            Self::ReferenceNotFound { detail: None } => "Reference not found by verifier".to_string(),
            Self::MissingAmount => "Verifier did not report a transfer amount".to_string(),
            Self::NonPositiveAmount => "Verifier reported a non-positive amount".to_string(),
            Self::ReceiverMismatch {
                reported: Some(reported),
            } => format!("Transfer receiver {reported} does not match the expected receiver account"),
            Self::ReceiverMismatch { reported: None } => {
                "Transfer receiver could not be matched to the expected receiver account".to_string()
            }
            Self::VerifierUnavailable { detail } => format!("Verifier unavailable: {detail}"),
            Self::VerifierTimedOut { timeout_secs } => {
                format!("Verifier did not respond within {timeout_secs}s")
            }
        }
    }
}

/// Outcome of checking one verifier result against the expected receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDecision {
    /// VERIFIED or UNVERIFIED.
    pub status: DepositStatus,
    /// Reported amount, when present.
    pub amount: Option<Decimal>,
    /// The first failed check, when UNVERIFIED.
    pub failure: Option<VerificationFailure>,
}

impl VerificationDecision {
    /// UNVERIFIED decision with the given reason.
    #[must_use]
    pub const fn unverified(failure: VerificationFailure, amount: Option<Decimal>) -> Self {
        Self {
            status: DepositStatus::Unverified,
            amount,
            failure: Some(failure),
        }
    }

    /// Returns true if the deposit should be credited.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == DepositStatus::Verified
    }

    /// The amount to credit, only for a verified decision.
    #[must_use]
    pub fn credit_amount(&self) -> Option<Decimal> {
        self.amount.filter(|_| self.is_verified())
    }

    /// Error message for an unverified decision.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.failure.as_ref().map(VerificationFailure::message)
    }
}

/// Decides VERIFIED or UNVERIFIED.
///
/// VERIFIED iff the reference was found, an amount that is positive in minor
/// units is present, and the reported receiver matches one of `expected`. A failed `success` flag
/// is decisive regardless of any other fields the verifier filled in.
#[must_use]
pub fn evaluate(result: &VerifierResult, expected: &[ExpectedReceiver]) -> VerificationDecision {
    if !result.success {
        return VerificationDecision::unverified(
            VerificationFailure::ReferenceNotFound {
                detail: result.message.clone(),
            },
            result.amount,
        );
    }

    let Some(amount) = result.amount.map(round_minor) else {
        return VerificationDecision::unverified(VerificationFailure::MissingAmount, None);
    };
    if amount <= Decimal::ZERO {
        return VerificationDecision::unverified(VerificationFailure::NonPositiveAmount, Some(amount));
    }

    let matched = expected.iter().any(|receiver| {
        receiver_matches(
            result.receiver_account.as_deref(),
            result.receiver_name.as_deref(),
            receiver,
        )
    });
    if !matched {
        return VerificationDecision::unverified(
            VerificationFailure::ReceiverMismatch {
                reported: result.receiver_account.clone(),
            },
            Some(amount),
        );
    }

    VerificationDecision {
        status: DepositStatus::Verified,
        amount: Some(amount),
        failure: None,
    }
}
