//! # market-checkout: Checkout Engine Services
//!
//! The Cart → Order → Payment consistency pipeline.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Pipeline                                  │
//! │                                                                         │
//! │  CartService ──► CheckoutService ──► PaymentGateway ──► Reconciler     │
//! │   add_item        create_order        create_intent      on_callback   │
//! │   change_qty      (validate +         (pending row +     (verify +     │
//! │   remove/clear     order + clear       remote call)       idempotent   │
//! │   get              cart, one tx)            │             apply)       │
//! │                         │                   │                │          │
//! │                         ▼                   ▼                ▼          │
//! │                   FulfillmentService: in_progress → paid → completed   │
//! │                   (stock deducted exactly once, at completed)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Checkout is atomic: order + frozen lines + cleared cart, or nothing
//! - Stock never goes negative and is deducted at most once per order
//! - Duplicate webhook deliveries are acknowledged without side effects
//! - A payment that succeeded stays succeeded even when the order cannot
//!   follow (surfaced as `OrderOutOfSync`, never swallowed)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use market_checkout::{CartService, CheckoutService, FulfillmentService,
//!                       GatewayConfig, LogNotifier, PaymentGateway, Reconciler};
//! use market_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("market.db")).await?;
//! let notifier = Arc::new(LogNotifier);
//!
//! let carts = CartService::new(db.clone());
//! let checkout = CheckoutService::new(db.clone(), notifier.clone());
//! let fulfillment = FulfillmentService::new(db.clone(), notifier.clone());
//!
//! let config = GatewayConfig::from_env()?;
//! let secret = config.webhook_secret.clone();
//! let gateway = PaymentGateway::new(config, db.clone())?;
//! let reconciler = Reconciler::new(db, fulfillment.clone(), notifier, secret);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod error;
pub mod fulfillment;
pub mod gateway;
pub mod notify;
pub mod reconciler;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart::{CartService, CartView};
pub use checkout::CheckoutService;
pub use error::{CheckoutError, CheckoutResult};
pub use fulfillment::FulfillmentService;
pub use gateway::{GatewayConfig, PaymentGateway, PaymentIntent};
pub use notify::{LogNotifier, Notifier};
pub use reconciler::{verify_signature, Ack, Reconciler};
