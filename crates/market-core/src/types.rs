//! # Domain Types
//!
//! Core domain types for the Market checkout engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  kind + sku     │   │  order_number   │   │  order_id (FK)  │       │
//! │  │  retail/whole-  │   │  status         │   │  method, status │       │
//! │  │  sale prices    │   │  total_cents    │   │  external_id    │       │
//! │  │  stock          │   └────────┬────────┘   └─────────────────┘       │
//! │  └─────────────────┘            │                                      │
//! │                          ┌──────┴────────┐                             │
//! │  ┌─────────────────┐     │  OrderLine    │                             │
//! │  │  Cart/CartLine  │     │  ───────────  │                             │
//! │  │  one cart per   │     │  frozen unit  │                             │
//! │  │  user, merged   │     │  price + qty  │                             │
//! │  │  lines          │     └───────────────┘                             │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, order_number) - human-readable
//!
//! Products are a single kind-tagged table; a `ProductRef` (kind + id) is
//! how carts and orders point at one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Currency, Money};
use crate::status::{OrderStatus, PaymentStatus};

// =============================================================================
// Product Kind
// =============================================================================

/// The catalog category a product belongs to.
///
/// One tagged table instead of per-category tables: every kind goes
/// through the same pricing and stock path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Processor,
    FlashDrive,
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductKind::Processor => f.write_str("processor"),
            ProductKind::FlashDrive => f.write_str("flash_drive"),
        }
    }
}

// =============================================================================
// Product Reference
// =============================================================================

/// A (kind, id) pair identifying a catalog product.
///
/// Cart and order lines store this pair rather than a bare id so the
/// reference stays unambiguous if kinds ever move to separate tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub kind: ProductKind,
    pub id: String,
}

impl ProductRef {
    pub fn new(kind: ProductKind, id: impl Into<String>) -> Self {
        ProductRef {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product available for purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Catalog category.
    pub kind: ProductKind,

    /// Stock Keeping Unit - business identifier, unique per kind.
    pub sku: String,

    /// Display name shown in the cart and on the order.
    pub name: String,

    /// Manufacturer brand.
    pub brand: String,

    /// Retail unit price in minor units.
    pub retail_price_cents: i64,

    /// Wholesale unit price in minor units.
    pub wholesale_price_cents: i64,

    /// Minimum quantity for the wholesale tier to apply.
    pub wholesale_min_qty: i64,

    /// Current stock level.
    pub stock: i64,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the product's (kind, id) reference.
    #[inline]
    pub fn product_ref(&self) -> ProductRef {
        ProductRef::new(self.kind, self.id.clone())
    }

    /// Returns the retail price as Money.
    #[inline]
    pub fn retail_price(&self) -> Money {
        Money::from_minor(self.retail_price_cents)
    }

    /// Returns the wholesale price as Money.
    #[inline]
    pub fn wholesale_price(&self) -> Money {
        Money::from_minor(self.wholesale_price_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A user's shopping cart.
///
/// One active cart per user, created at registration and kept for the
/// lifetime of the account. Checkout empties it, never deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in a cart.
///
/// At most one line per (cart, product reference); adding the same
/// product again merges into the existing line. The unit price is the
/// tier price at insertion time and is advisory only - checkout always
/// re-prices against the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub cart_id: String,
    pub product_kind: ProductKind,
    pub product_id: String,
    pub quantity: i64,
    /// Tier unit price captured when the line was last touched.
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    #[inline]
    pub fn product_ref(&self) -> ProductRef {
        ProductRef::new(self.product_kind, self.product_id.clone())
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_cents)
    }

    /// Line subtotal at the captured price.
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A durable order snapshot.
///
/// Immutable after creation except for `status`. The total is computed
/// from the lines at creation time and never revised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Monotonic per-shop order number, assigned at creation.
    pub order_number: i64,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_cents)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item in an order.
/// Snapshot pattern: the unit price is frozen at order-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_kind: ProductKind,
    pub product_id: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    /// Unit price in minor units at order time (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    #[inline]
    pub fn product_ref(&self) -> ProductRef {
        ProductRef::new(self.product_kind, self.product_id.clone())
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_cents)
    }

    /// Line total (unit_price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays at the external gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank card checkout at the gateway.
    BankCard,
    /// Fast payment system (QR) checkout.
    Sbp,
}

impl PaymentMethod {
    /// The gateway wire name for this method.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            PaymentMethod::BankCard => "bank_card",
            PaymentMethod::Sbp => "sbp",
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment attempt against an order.
///
/// An order may accumulate several attempts, but at most one of them is
/// open (non-terminal) at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: Currency,
    /// Gateway-side payment id, set once the intent is created remotely.
    /// Unique across all payments once set.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
