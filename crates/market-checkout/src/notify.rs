//! # Notifications
//!
//! Fire-and-forget milestone notifications.
//!
//! The engine announces order/payment milestones through the [`Notifier`]
//! trait; delivery (mail, push, nothing) is the host application's
//! business. Notification failures must never fail or roll back the
//! operation that triggered them, which is why the trait is synchronous
//! and infallible: an implementation that does real I/O should enqueue
//! and return.

use tracing::info;

use market_core::{Order, Payment};

/// Milestone notification sink.
pub trait Notifier: Send + Sync {
    /// Order created from a cart.
    fn order_created(&self, order: &Order);

    /// Gateway confirmed payment; order moved to paid.
    fn order_paid(&self, order: &Order);

    /// Order fulfilled; stock deducted.
    fn order_completed(&self, order: &Order);

    /// Order cancelled or failed before completion.
    fn order_closed(&self, order: &Order);

    /// A payment attempt ended unsuccessfully.
    fn payment_failed(&self, payment: &Payment);
}

/// Default notifier that logs milestones via tracing.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn order_created(&self, order: &Order) {
        info!(
            order_id = %order.id,
            order_number = order.order_number,
            total = %order.total(),
            "Order created"
        );
    }

    fn order_paid(&self, order: &Order) {
        info!(order_id = %order.id, "Order paid");
    }

    fn order_completed(&self, order: &Order) {
        info!(order_id = %order.id, "Order completed");
    }

    fn order_closed(&self, order: &Order) {
        info!(order_id = %order.id, status = %order.status, "Order closed");
    }

    fn payment_failed(&self, payment: &Payment) {
        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            "Payment failed"
        );
    }
}
