//! # Checkout Service
//!
//! Cart validation and atomic order creation.
//!
//! ## The Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 One BEGIN IMMEDIATE transaction                         │
//! │                                                                         │
//! │  1. Load cart, check ownership                                         │
//! │  2. Load each product, compute effective availability                  │
//! │     (stock − units committed to open orders)                           │
//! │  3. price_lines: all-or-nothing tier pricing + stock check             │
//! │  4. Assign the next monotonic order number                             │
//! │  5. INSERT order (in_progress) + order lines (frozen prices)           │
//! │  6. DELETE cart lines (cart row persists)                              │
//! │  7. COMMIT — or ROLLBACK everything on any failure                     │
//! │                                                                         │
//! │  The stock counter is untouched here. IMMEDIATE means two              │
//! │  concurrent checkouts serialize: the second re-reads reservations      │
//! │  after the first committed and sees the last unit gone.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use market_core::{
    price_lines, Cart, CoreError, Currency, LineRequest, Money, Order, OrderLine, OrderStatus,
    PricedLine, Product,
};
use market_db::{CartRepository, Database, OrderRepository, ProductRepository};

use crate::error::{CheckoutError, CheckoutResult};
use crate::notify::Notifier;

/// Cart validation and atomic order creation.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutService {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        CheckoutService { db, notifier }
    }

    /// Validates and prices the cart without creating an order.
    ///
    /// Same rules as [`create_order`](Self::create_order); runs in its
    /// own transaction (rolled back) so the numbers are from one
    /// consistent snapshot.
    pub async fn validate(
        &self,
        user_id: &str,
        cart_id: &str,
    ) -> CheckoutResult<(Vec<PricedLine>, Money)> {
        let mut tx = self.db.begin_immediate().await?;
        let result = Self::validate_tx(tx.conn(), user_id, cart_id).await;
        tx.rollback().await?;
        result
    }

    /// Converts the cart into an order, atomically.
    ///
    /// On success the order exists in `in_progress` with frozen line
    /// prices and the cart is empty. On any failure nothing changed.
    pub async fn create_order(&self, user_id: &str, cart_id: &str) -> CheckoutResult<Order> {
        let mut tx = self.db.begin_immediate().await?;

        let result = Self::create_order_tx(tx.conn(), user_id, cart_id).await;

        let order = match result {
            Ok(order) => {
                tx.commit().await?;
                order
            }
            Err(e) => {
                warn!(cart_id = %cart_id, error = %e, "Checkout rolled back");
                tx.rollback().await?;
                return Err(e);
            }
        };

        info!(
            order_id = %order.id,
            order_number = order.order_number,
            total = %order.total(),
            "Checkout complete"
        );
        self.notifier.order_created(&order);

        Ok(order)
    }

    /// The whole checkout unit, on the caller's transaction.
    async fn create_order_tx(
        conn: &mut SqliteConnection,
        user_id: &str,
        cart_id: &str,
    ) -> CheckoutResult<Order> {
        let (lines, total) = Self::validate_tx(conn, user_id, cart_id).await?;

        let order_number = OrderRepository::next_order_number_tx(conn).await?;
        let now = Utc::now();

        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            order_number,
            status: OrderStatus::InProgress,
            total_cents: total.minor(),
            currency: Currency::Rub,
            created_at: now,
            updated_at: now,
        };

        OrderRepository::insert_tx(conn, &order).await?;

        for priced in &lines {
            let line = OrderLine {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_kind: priced.product.kind,
                product_id: priced.product.id.clone(),
                name_snapshot: priced.name.clone(),
                unit_price_cents: priced.unit_price.minor(),
                quantity: priced.quantity,
                created_at: now,
            };
            OrderRepository::insert_line_tx(conn, &line).await?;
        }

        CartRepository::clear_tx(conn, cart_id).await?;

        Ok(order)
    }

    /// Ownership check, effective-availability computation and
    /// all-or-nothing pricing, on the caller's transaction.
    async fn validate_tx(
        conn: &mut SqliteConnection,
        user_id: &str,
        cart_id: &str,
    ) -> CheckoutResult<(Vec<PricedLine>, Money)> {
        let cart = Self::owned_cart(conn, user_id, cart_id).await?;
        let cart_lines = CartRepository::lines_tx(conn, &cart.id).await?;

        // Pricing uses the live product records, never the prices
        // captured on the cart lines.
        let mut loaded: Vec<(Product, i64, i64)> = Vec::with_capacity(cart_lines.len());
        for line in &cart_lines {
            let product_ref = line.product_ref();
            let product = ProductRepository::get_tx(conn, &product_ref)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_ref.to_string()))?;

            let reserved = ProductRepository::reserved_quantity_tx(conn, &product_ref).await?;
            let effective = product.stock - reserved;

            loaded.push((product, line.quantity, effective));
        }

        let requests: Vec<LineRequest<'_>> = loaded
            .iter()
            .map(|(product, quantity, effective)| LineRequest {
                product,
                quantity: *quantity,
                effective_available: *effective,
            })
            .collect();

        let (priced, total) = price_lines(&requests)?;
        Ok((priced, total))
    }

    async fn owned_cart(
        conn: &mut SqliteConnection,
        user_id: &str,
        cart_id: &str,
    ) -> CheckoutResult<Cart> {
        let cart = CartRepository::get_tx(conn, cart_id)
            .await?
            .ok_or_else(|| CheckoutError::CartNotFound(cart_id.to_string()))?;

        if cart.user_id != user_id {
            return Err(CoreError::NotOwned {
                resource: "Cart",
                id: cart_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        Ok(cart)
    }
}
