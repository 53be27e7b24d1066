//! # Fulfillment Service
//!
//! Drives the order state machine.
//!
//! ## Transitions and Side Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  mark_paid   in_progress → paid        (reconciler, after payment)     │
//! │  complete    paid → completed          deducts stock, guarded          │
//! │  cancel      in_progress → cancelled   admin path, no deduction        │
//! │  fail        in_progress → failed      admin/reconciler, no deduction  │
//! │                                                                         │
//! │  Stock policy: deducted exactly once, on the transition into           │
//! │  completed, inside the same transaction as the status update. A        │
//! │  guarded per-line UPDATE (stock >= qty) failing rolls the whole        │
//! │  transition back — status and stock both unchanged.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancelling or failing an order releases its reservation implicitly:
//! the order stops counting against effective availability, and nothing
//! was ever deducted.

use std::sync::Arc;

use sqlx::SqliteConnection;
use tracing::info;

use market_core::{CoreError, Order, OrderStatus};
use market_db::{Database, DbError, OrderRepository, ProductRepository};

use crate::error::{CheckoutError, CheckoutResult};
use crate::notify::Notifier;

/// Order state machine driver.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl FulfillmentService {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        FulfillmentService { db, notifier }
    }

    /// Marks an order paid (payment confirmed by the gateway).
    pub async fn mark_paid(&self, order_id: &str) -> CheckoutResult<Order> {
        let order = self.transition(order_id, OrderStatus::Paid).await?;
        self.notifier.order_paid(&order);
        Ok(order)
    }

    /// Completes a paid order, deducting stock for every line.
    pub async fn complete(&self, order_id: &str) -> CheckoutResult<Order> {
        let order = self.transition(order_id, OrderStatus::Completed).await?;
        self.notifier.order_completed(&order);
        Ok(order)
    }

    /// Cancels an order that has not been paid. No stock to release.
    pub async fn cancel(&self, order_id: &str) -> CheckoutResult<Order> {
        let order = self.transition(order_id, OrderStatus::Cancelled).await?;
        self.notifier.order_closed(&order);
        Ok(order)
    }

    /// Fails an order whose payment attempt ended unsuccessfully.
    pub async fn fail(&self, order_id: &str) -> CheckoutResult<Order> {
        let order = self.transition(order_id, OrderStatus::Failed).await?;
        self.notifier.order_closed(&order);
        Ok(order)
    }

    /// One transition, one transaction.
    async fn transition(&self, order_id: &str, to: OrderStatus) -> CheckoutResult<Order> {
        let mut tx = self.db.begin_immediate().await?;

        let result = Self::transition_tx(tx.conn(), order_id, to).await;

        match result {
            Ok(order) => {
                tx.commit().await?;
                info!(order_id = %order_id, to = %to, "Order transitioned");
                Ok(order)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn transition_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
        to: OrderStatus,
    ) -> CheckoutResult<Order> {
        let mut order = OrderRepository::get_tx(conn, order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))?;

        // Checked against the status read under the write lock, so the
        // guarded UPDATE below cannot lose a race with another writer.
        order.status.check_transition(to).map_err(CheckoutError::from)?;

        if to == OrderStatus::Completed {
            Self::deduct_lines(conn, order_id).await?;
        }

        OrderRepository::update_status_tx(conn, order_id, order.status, to).await?;
        order.status = to;

        Ok(order)
    }

    /// Per-line guarded deduction; the hard floor behind the validator's
    /// reservation arithmetic.
    async fn deduct_lines(conn: &mut SqliteConnection, order_id: &str) -> CheckoutResult<()> {
        let lines = OrderRepository::lines_tx(conn, order_id).await?;

        for line in &lines {
            let product_ref = line.product_ref();
            match ProductRepository::deduct_stock_tx(conn, &product_ref, line.quantity).await {
                Ok(()) => {}
                Err(DbError::GuardFailed { .. }) => {
                    return Err(CoreError::StockExhausted {
                        product: product_ref.to_string(),
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
