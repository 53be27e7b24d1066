//! # Error Types
//!
//! Domain-specific error types for market-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  market-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  market-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  market-checkout errors (separate crate)                               │
//! │  └── CheckoutError    - Engine-level errors (gateway, webhooks)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → CheckoutError → Caller  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, quantities)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. None of them imply a
/// partial write: the layer that raises one has mutated nothing, or is
/// inside a transaction that will roll back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product reference does not resolve in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough effective stock to cover the requested quantity.
    ///
    /// `available` is stock minus units committed to open orders, so it
    /// can be lower than the raw stock counter.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Checkout attempted on a cart with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The acting user does not own the cart/order in question.
    #[error("{resource} {id} is not owned by user {user_id}")]
    NotOwned {
        resource: &'static str,
        id: String,
        user_id: String,
    },

    /// Requested order status change is not in the transition table.
    #[error("Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Completing the order would drive a product's stock negative.
    ///
    /// Raised by the guarded deduction; the whole transition rolls back
    /// and both stock and status are unchanged.
    #[error("Stock exhausted for {product}")]
    StockExhausted { product: String },

    /// A status string from the database or the wire is not recognized.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before business logic runs; never leaves a partial write.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: &'static str, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
