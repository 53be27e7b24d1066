//! # Payment Repository
//!
//! Database operations for payment attempts.
//!
//! The reconciler looks payments up by the gateway's external id, which
//! the schema keeps unique. Status updates are guarded on `pending`, so
//! a payment that has reached a terminal state can never move again no
//! matter how many times a webhook is redelivered.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use market_core::{Payment, PaymentStatus};

const PAYMENT_COLUMNS: &str =
    "id, order_id, method, status, amount_cents, currency, external_id, created_at, updated_at";

const INSERT_PAYMENT: &str = r#"
    INSERT INTO payments (
        id, order_id, method, status,
        amount_cents, currency, external_id, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Inserts a payment row.
    ///
    /// Inserted in `pending` status *before* the gateway call, so a
    /// crashed or timed-out call still leaves a row to reconcile against.
    pub async fn insert(&self, payment: &Payment) -> DbResult<()> {
        debug!(id = %payment.id, order_id = %payment.order_id, "Inserting payment");

        sqlx::query(INSERT_PAYMENT)
            .bind(&payment.id)
            .bind(&payment.order_id)
            .bind(payment.method)
            .bind(payment.status)
            .bind(payment.amount_cents)
            .bind(payment.currency)
            .bind(&payment.external_id)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inserts a payment row inside a transaction.
    ///
    /// The partial unique index on (order_id) WHERE status = 'pending'
    /// rejects a second open attempt even if the caller's check raced.
    pub async fn insert_tx(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        sqlx::query(INSERT_PAYMENT)
            .bind(&payment.id)
            .bind(&payment.order_id)
            .bind(payment.method)
            .bind(payment.status)
            .bind(payment.amount_cents)
            .bind(payment.currency)
            .bind(&payment.external_id)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Gets a payment by ID.
    pub async fn get(&self, payment_id: &str) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets a payment by the gateway's external id.
    pub async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE external_id = ?1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// The open (pending) payment attempt for an order, if any.
    ///
    /// At most one exists (enforced by a partial unique index); the
    /// gateway adapter refuses to create a second intent while one is
    /// open. Runs inside the intent-creation transaction.
    pub async fn open_for_order_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE order_id = ?1 AND status = 'pending' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Records the gateway-assigned external id on a pending payment.
    pub async fn set_external_id(&self, payment_id: &str, external_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE payments SET external_id = ?2, updated_at = ?3 \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(payment_id)
        .bind(external_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("Payment", payment_id));
        }

        Ok(())
    }

    /// Moves a payment out of `pending`, guarded.
    ///
    /// Zero rows affected means the payment already left `pending`; the
    /// reconciler treats that as a duplicate delivery.
    pub async fn update_status_tx(
        conn: &mut SqliteConnection,
        payment_id: &str,
        to: PaymentStatus,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE payments SET status = ?2, updated_at = ?3 \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(payment_id)
        .bind(to)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("Payment", payment_id));
        }

        debug!(payment_id = %payment_id, to = %to, "Payment status updated");
        Ok(())
    }
}
