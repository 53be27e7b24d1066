//! # Status State Machines
//!
//! Pure transition tables for order and payment lifecycles.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   in_progress ──────────► paid ──────────► completed (terminal)         │
//! │       │                                                                 │
//! │       ├──────────► cancelled (terminal)                                 │
//! │       └──────────► failed    (terminal)                                 │
//! │                                                                         │
//! │   Stock is deducted exactly once: on the paid → completed transition.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Lifecycle
//! ```text
//!   pending ──► succeeded (terminal)
//!      └──────► canceled  (terminal)
//! ```
//!
//! Both tables are total functions: every (from, to) pair answers yes or
//! no with no I/O, so duplicate webhook deliveries and admin actions can
//! be checked before touching the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created, awaiting payment.
    InProgress,
    /// Payment confirmed by the gateway.
    Paid,
    /// Fulfilled; stock has been deducted.
    Completed,
    /// Payment failed.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl OrderStatus {
    /// Whether this status accepts no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Whether an order in this status still reserves its lines' stock.
    ///
    /// Open orders count against effective availability during cart
    /// validation even though the stock counter is untouched until
    /// completion.
    pub const fn reserves_stock(&self) -> bool {
        matches!(self, OrderStatus::InProgress | OrderStatus::Paid)
    }

    /// Whether `self -> to` is an allowed transition.
    pub const fn can_transition_to(&self, to: OrderStatus) -> bool {
        match (self, to) {
            (OrderStatus::InProgress, OrderStatus::Paid)
            | (OrderStatus::InProgress, OrderStatus::Cancelled)
            | (OrderStatus::InProgress, OrderStatus::Failed)
            | (OrderStatus::Paid, OrderStatus::Completed) => true,
            _ => false,
        }
    }

    /// Checks the transition, returning `InvalidTransition` on refusal.
    pub fn check_transition(&self, to: OrderStatus) -> Result<(), CoreError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Paid => "paid",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(OrderStatus::InProgress),
            "paid" => Ok(OrderStatus::Paid),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::InProgress
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// The status of a payment attempt, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent created, awaiting the customer.
    Pending,
    /// Gateway confirmed the charge.
    Succeeded,
    /// Gateway cancelled or the customer abandoned.
    Canceled,
}

impl PaymentStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Canceled)
    }

    /// Payment statuses are monotone: pending may move to either
    /// terminal state, terminal states accept nothing.
    pub const fn can_transition_to(&self, to: PaymentStatus) -> bool {
        match (self, to) {
            (PaymentStatus::Pending, PaymentStatus::Succeeded)
            | (PaymentStatus::Pending, PaymentStatus::Canceled) => true,
            _ => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_happy_path() {
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_order_admin_paths() {
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Failed));
    }

    #[test]
    fn test_order_terminal_states_reject_everything() {
        let terminals = [
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ];
        let all = [
            OrderStatus::InProgress,
            OrderStatus::Paid,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ];

        for from in terminals {
            assert!(from.is_terminal());
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to} must fail");
            }
        }
    }

    #[test]
    fn test_order_skipping_paid_rejected() {
        assert!(!OrderStatus::InProgress.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_check_transition_error() {
        let err = OrderStatus::Completed
            .check_transition(OrderStatus::Paid)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid order transition: completed -> paid"
        );
    }

    #[test]
    fn test_reserves_stock() {
        assert!(OrderStatus::InProgress.reserves_stock());
        assert!(OrderStatus::Paid.reserves_stock());
        assert!(!OrderStatus::Completed.reserves_stock());
        assert!(!OrderStatus::Cancelled.reserves_stock());
        assert!(!OrderStatus::Failed.reserves_stock());
    }

    #[test]
    fn test_payment_monotone() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Canceled));
        assert!(!PaymentStatus::Succeeded.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Succeeded.can_transition_to(PaymentStatus::Canceled));
        assert!(!PaymentStatus::Canceled.can_transition_to(PaymentStatus::Succeeded));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::InProgress,
            OrderStatus::Paid,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Canceled,
        ] {
            assert_eq!(s.as_str().parse::<PaymentStatus>().unwrap(), s);
        }
    }
}
