//! Mapping of database failures onto wallet errors.

use kasa_core::wallet::WalletError;
use sea_orm::{DbErr, RuntimeErr};

/// SQLSTATE for serialization failures.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for detected deadlocks.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Unique indexes whose violation means another writer won a race; the
/// operation is retried and then observes the committed winner.
const RACE_INDEXES: [&str; 3] = [
    "uq_wallet_transactions_sequence",
    "uq_wallet_transactions_charge_payment",
    "uq_wallet_deposits_verified_reference",
];

fn database_error(err: &DbErr) -> Option<&dyn sqlx::error::DatabaseError> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e.as_database_error(),
        _ => None,
    }
}

/// Returns the SQLSTATE code of a database error, if any.
pub fn sqlstate(err: &DbErr) -> Option<String> {
    database_error(err)
        .and_then(|db_err| db_err.code())
        .map(std::borrow::Cow::into_owned)
}

/// Returns true if `err` violated the named unique constraint or index.
pub fn is_unique_violation(err: &DbErr, constraint: &str) -> bool {
    database_error(err).is_some_and(|db_err| {
        db_err.code().as_deref() == Some(UNIQUE_VIOLATION) && db_err.constraint() == Some(constraint)
    })
}

/// Converts a `DbErr` into a `WalletError`.
///
/// Serialization failures, deadlocks and lost races on the wallet's unique
/// indexes become `ConcurrentModification` so callers retry them.
pub fn map_db_err(err: DbErr) -> WalletError {
    let code = sqlstate(&err);
    let retryable = matches!(code.as_deref(), Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED))
        || RACE_INDEXES
            .iter()
            .any(|index| is_unique_violation(&err, index));

    if retryable {
        tracing::debug!(sqlstate = ?code, error = %err, "Write conflict");
        WalletError::ConcurrentModification
    } else {
        WalletError::Database(err.to_string())
    }
}
