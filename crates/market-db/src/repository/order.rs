//! # Order Repository
//!
//! Database operations for orders and order lines.
//!
//! ## Status-Guarded Updates
//! Every status change is a single conditional UPDATE
//! (`WHERE id = ? AND status = ?`) checked via `rows_affected()`. Under
//! concurrent webhooks or admin actions, exactly one writer observes the
//! expected from-status; everyone else gets `GuardFailed` and nothing
//! changes. This is what makes duplicate webhook deliveries harmless.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use market_core::{Order, OrderLine, OrderStatus};

const ORDER_COLUMNS: &str =
    "id, user_id, order_number, status, total_cents, currency, created_at, updated_at";
const LINE_COLUMNS: &str = "id, order_id, product_kind, product_id, name_snapshot, \
     unit_price_cents, quantity, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Next monotonic order number.
    ///
    /// Runs inside the IMMEDIATE checkout transaction, so the read and
    /// the insert that uses it are atomic against other checkouts.
    pub async fn next_order_number_tx(conn: &mut SqliteConnection) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(order_number), 0) + 1 FROM orders")
            .fetch_one(conn)
            .await?;

        Ok(next)
    }

    /// Inserts an order inside a transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_number, status,
                total_cents, currency, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.order_number)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.currency)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts an order line inside a transaction.
    pub async fn insert_line_tx(conn: &mut SqliteConnection, line: &OrderLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, product_kind, product_id,
                name_snapshot, unit_price_cents, quantity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(line.product_kind)
        .bind(&line.product_id)
        .bind(&line.name_snapshot)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets an order by ID.
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets an order by ID inside a transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Gets all lines of an order, oldest first.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let rows = sqlx::query_as::<_, OrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Gets all lines of an order inside a transaction.
    pub async fn lines_tx(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let rows = sqlx::query_as::<_, OrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at"
        ))
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY order_number DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Moves an order from `from` to `to`, guarded on the from-status.
    ///
    /// Returns `GuardFailed` when the order is no longer in `from`; the
    /// caller decides whether that is a conflict or a duplicate no-op.
    pub async fn update_status_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(order_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("Order", order_id));
        }

        debug!(order_id = %order_id, from = %from, to = %to, "Order status updated");
        Ok(())
    }
}
