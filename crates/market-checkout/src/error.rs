//! # Engine Error Types
//!
//! `CheckoutError` is what callers of the engine see: domain and
//! database errors from the lower layers, plus the gateway and
//! reconciliation failures that only exist at this level.

use thiserror::Error;

use market_core::CoreError;
use market_db::DbError;

/// Errors surfaced by the checkout engine services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Business rule violation from market-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure from market-db.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Cart id does not resolve.
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Order id does not resolve.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The gateway call failed (non-2xx, timeout, or malformed reply).
    ///
    /// The pending Payment row is left in place for reconciliation; the
    /// call is never silently retried because a retry with a new
    /// idempotency key could double-charge.
    #[error("Payment gateway error: {0}")]
    ExternalGatewayError(String),

    /// The order already has an open (pending) payment attempt.
    #[error("Order {order_id} already has an open payment attempt {payment_id}")]
    IntentAlreadyOpen {
        order_id: String,
        payment_id: String,
    },

    /// Webhook signature did not verify. Zero state change.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook body did not parse as a payment event.
    #[error("Malformed webhook payload: {0}")]
    MalformedCallback(String),

    /// Webhook referenced a payment the engine never created.
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),

    /// Payment reached a terminal state but the order transition failed.
    ///
    /// The payment update is already committed and stays committed; an
    /// operator has to look at the order.
    #[error("Order {order_id} out of sync with payment {payment_id}: {reason}")]
    OrderOutOfSync {
        order_id: String,
        payment_id: String,
        reason: String,
    },

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_passes_through() {
        let err: CheckoutError = CoreError::EmptyCart.into();
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[test]
    fn test_out_of_sync_message() {
        let err = CheckoutError::OrderOutOfSync {
            order_id: "o1".to_string(),
            payment_id: "p1".to_string(),
            reason: "order already cancelled".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Order o1 out of sync with payment p1: order already cancelled"
        );
    }
}
