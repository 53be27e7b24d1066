//! # Product Repository
//!
//! Database operations for the kind-tagged product catalog.
//!
//! ## Stock Accounting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Two Stock Numbers                                 │
//! │                                                                         │
//! │  stock (column)          counter, decremented only when an order       │
//! │                          completes, guarded so it never goes negative  │
//! │                                                                         │
//! │  effective availability  stock minus units committed to open           │
//! │                          (in_progress / paid) orders; what the cart    │
//! │                          validator checks                              │
//! │                                                                         │
//! │  Example: stock 1, one open order holding 1                            │
//! │    → reserved_quantity_tx = 1                                          │
//! │    → effective availability = 0 → second checkout refused              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use market_core::{Product, ProductKind, ProductRef};

const PRODUCT_COLUMNS: &str = "id, kind, sku, name, brand, retail_price_cents, \
     wholesale_price_cents, wholesale_min_qty, stock, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, kind, sku, name, brand,
                retail_price_cents, wholesale_price_cents, wholesale_min_qty,
                stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(product.kind)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.retail_price_cents)
        .bind(product.wholesale_price_cents)
        .bind(product.wholesale_min_qty)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by reference.
    pub async fn get(&self, product: &ProductRef) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE kind = ?1 AND id = ?2"
        ))
        .bind(product.kind)
        .bind(&product.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets a product by reference inside a transaction.
    pub async fn get_tx(
        conn: &mut SqliteConnection,
        product: &ProductRef,
    ) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE kind = ?1 AND id = ?2"
        ))
        .bind(product.kind)
        .bind(&product.id)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Lists products of one kind.
    pub async fn list_by_kind(&self, kind: ProductKind) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE kind = ?1 ORDER BY name"
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sets the raw stock counter (admin / restock path).
    pub async fn set_stock(&self, product: &ProductRef, stock: i64) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET stock = ?3, updated_at = ?4 WHERE kind = ?1 AND id = ?2",
        )
        .bind(product.kind)
        .bind(&product.id)
        .bind(stock)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.to_string()));
        }

        Ok(())
    }

    /// Units of a product committed to open (stock-reserving) orders.
    ///
    /// Used by the cart validator to compute effective availability.
    /// Must run inside the same transaction as the validation that
    /// depends on it.
    pub async fn reserved_quantity_tx(
        conn: &mut SqliteConnection,
        product: &ProductRef,
    ) -> DbResult<i64> {
        let reserved: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ol.quantity), 0)
            FROM order_lines ol
            JOIN orders o ON o.id = ol.order_id
            WHERE ol.product_kind = ?1
              AND ol.product_id = ?2
              AND o.status IN ('in_progress', 'paid')
            "#,
        )
        .bind(product.kind)
        .bind(&product.id)
        .fetch_one(conn)
        .await?;

        Ok(reserved)
    }

    /// Deducts stock, guarded so the counter can never go negative.
    ///
    /// Returns `GuardFailed` when the remaining stock does not cover
    /// `quantity`; the caller turns that into `StockExhausted` and rolls
    /// the surrounding transaction back.
    pub async fn deduct_stock_tx(
        conn: &mut SqliteConnection,
        product: &ProductRef,
        quantity: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?3, updated_at = ?4
            WHERE kind = ?1 AND id = ?2 AND stock >= ?3
            "#,
        )
        .bind(product.kind)
        .bind(&product.id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("Product", product.to_string()));
        }

        Ok(())
    }
}
