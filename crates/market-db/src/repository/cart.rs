//! # Cart Repository
//!
//! Database operations for carts and cart lines.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE AT REGISTRATION                                             │
//! │     └── create() → Cart, one per user, never deleted                   │
//! │                                                                         │
//! │  2. MUTATE                                                             │
//! │     └── upsert_line()       merge quantity into existing line          │
//! │     └── set_line_quantity() replace quantity (≤ 0 handled by caller)   │
//! │     └── remove_line()                                                  │
//! │                                                                         │
//! │  3. CHECKOUT                                                           │
//! │     └── clear_tx() inside the order-creation transaction               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use market_core::{Cart, CartLine, ProductRef};

const CART_COLUMNS: &str = "id, user_id, created_at, updated_at";
const LINE_COLUMNS: &str =
    "id, cart_id, product_kind, product_id, quantity, unit_price_cents, created_at, updated_at";

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Creates the cart for a user (called once, at registration).
    pub async fn create(&self, user_id: &str) -> DbResult<Cart> {
        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %cart.id, user_id = %user_id, "Creating cart");

        sqlx::query(
            "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets a cart by ID.
    pub async fn get(&self, cart_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"
        ))
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets a cart by ID inside a transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"
        ))
        .bind(cart_id)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Gets the cart belonging to a user.
    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets all lines of a cart, oldest first.
    pub async fn lines(&self, cart_id: &str) -> DbResult<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE cart_id = ?1 ORDER BY created_at"
        ))
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Gets all lines of a cart inside a transaction.
    pub async fn lines_tx(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE cart_id = ?1 ORDER BY created_at"
        ))
        .bind(cart_id)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Adds quantity of a product to a cart, merging into an existing
    /// line when one exists.
    ///
    /// The UNIQUE index on (cart_id, product_kind, product_id) makes this
    /// an upsert: the merge invariant lives in the schema, not in
    /// read-then-write application code.
    pub async fn upsert_line(
        &self,
        cart_id: &str,
        product: &ProductRef,
        quantity: i64,
        unit_price_cents: i64,
    ) -> DbResult<()> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(cart_id = %cart_id, product = %product, quantity, "Upserting cart line");

        sqlx::query(
            r#"
            INSERT INTO cart_lines (
                id, cart_id, product_kind, product_id,
                quantity, unit_price_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT (cart_id, product_kind, product_id) DO UPDATE SET
                quantity = quantity + excluded.quantity,
                unit_price_cents = excluded.unit_price_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(cart_id)
        .bind(product.kind)
        .bind(&product.id)
        .bind(quantity)
        .bind(unit_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the quantity (and re-resolved price) of an existing line.
    pub async fn set_line_quantity(
        &self,
        cart_id: &str,
        product: &ProductRef,
        quantity: i64,
        unit_price_cents: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE cart_lines
            SET quantity = ?4, unit_price_cents = ?5, updated_at = ?6
            WHERE cart_id = ?1 AND product_kind = ?2 AND product_id = ?3
            "#,
        )
        .bind(cart_id)
        .bind(product.kind)
        .bind(&product.id)
        .bind(quantity)
        .bind(unit_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart line", product.to_string()));
        }

        Ok(())
    }

    /// Removes one line from a cart.
    pub async fn remove_line(&self, cart_id: &str, product: &ProductRef) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM cart_lines \
             WHERE cart_id = ?1 AND product_kind = ?2 AND product_id = ?3",
        )
        .bind(cart_id)
        .bind(product.kind)
        .bind(&product.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart line", product.to_string()));
        }

        Ok(())
    }

    /// Deletes all lines of a cart (the cart row persists).
    pub async fn clear(&self, cart_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Deletes all lines of a cart inside a transaction.
    ///
    /// Called from the checkout transaction so order creation and cart
    /// clearing commit or roll back together.
    pub async fn clear_tx(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(conn)
            .await?;

        Ok(())
    }
}
