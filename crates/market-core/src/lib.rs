//! # market-core: Pure Business Logic for the Market Checkout Engine
//!
//! This crate is the **heart** of the checkout engine. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Market Checkout Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Server binary (lives elsewhere)                    │   │
//! │  │    Cart routes ──► Checkout route ──► Webhook route            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 market-checkout (engine services)               │   │
//! │  │    CartService, CheckoutService, Fulfillment, Gateway,         │   │
//! │  │    Reconciler                                                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ market-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  status   │  │  pricing  │  │   │
//! │  │   │  Product  │  │   Money   │  │  Order/   │  │  quote    │  │   │
//! │  │   │  Order    │  │  Currency │  │  Payment  │  │ price_    │  │   │
//! │  │   │  Payment  │  │           │  │  tables   │  │  lines    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  market-db (database layer)                     │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Cart, Order, Payment)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`status`] - Order and payment status transition tables
//! - [`pricing`] - Wholesale/retail tier pricing and cart pricing
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values in minor units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use market_core::money::Money;
//!
//! // Create money from minor units (never from floats!)
//! let price = Money::from_minor(10000); // 100.00
//!
//! // 3 units at retail
//! let total = price.multiply_quantity(3);
//! assert_eq!(total.minor(), 30000);
//! assert_eq!(total.to_decimal_string(), "300.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use market_core::Money` instead of
// `use market_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, Money};
pub use pricing::{price_lines, quote, LineRequest, PricedLine, Quote};
pub use status::{OrderStatus, PaymentStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product on one cart/order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
