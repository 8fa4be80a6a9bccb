//! Payment repository: the wallet-facing columns of payments.

use chrono::Utc;
use kasa_core::wallet::WalletError;
use kasa_shared::types::{MerchantId, PaymentId, WalletTransactionId};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use tracing::debug;

use crate::entities::payments;
use crate::error::map_db_err;

/// Payment repository.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a payment that has not been charged yet.
    pub async fn create(
        &self,
        merchant_id: MerchantId,
        amount: Decimal,
    ) -> Result<payments::Model, WalletError> {
        let now = Utc::now().into();
        payments::ActiveModel {
            id: Set(PaymentId::new().into_inner()),
            merchant_id: Set(merchant_id.into_inner()),
            amount: Set(amount),
            wallet_charged: Set(false),
            wallet_transaction_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(map_db_err)
    }

    /// Finds a payment row.
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        payment_id: PaymentId,
    ) -> Result<Option<payments::Model>, WalletError> {
        payments::Entity::find_by_id(payment_id.into_inner())
            .one(conn)
            .await
            .map_err(map_db_err)
    }

    /// Links a charge to its payment. Returns false if the payment row is
    /// not present.
    pub async fn mark_charged<C: ConnectionTrait>(
        conn: &C,
        payment_id: PaymentId,
        transaction_id: WalletTransactionId,
    ) -> Result<bool, WalletError> {
        let result = payments::Entity::update_many()
            .col_expr(payments::Column::WalletCharged, Expr::value(true))
            .col_expr(
                payments::Column::WalletTransactionId,
                Expr::value(transaction_id.into_inner()),
            )
            .filter(payments::Column::Id.eq(payment_id.into_inner()))
            .exec(conn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            debug!(payment_id = %payment_id, "No payment row to link the charge to");
        }
        Ok(result.rows_affected > 0)
    }
}
