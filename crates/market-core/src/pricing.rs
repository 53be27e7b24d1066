//! # Pricing Resolver
//!
//! Pure wholesale/retail tier pricing and cart pricing.
//!
//! ## Tier Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity >= wholesale_min_qty  →  wholesale unit price                 │
//! │  quantity <  wholesale_min_qty  →  retail unit price                    │
//! │                                                                         │
//! │  Example: retail 100.00, wholesale 80.00, min qty 5                     │
//! │    qty 3 → 3 × 100.00 = 300.00                                          │
//! │    qty 5 → 5 ×  80.00 = 400.00                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every product kind goes through this one path; there are no
//! per-kind pricing branches.
//!
//! `price_lines` is the all-or-nothing heart of the cart validator: it
//! takes each line with its product record and *effective* availability
//! (stock minus units committed to open orders, computed by the caller)
//! and either prices the whole cart or fails on the first problem.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, ProductRef};

// =============================================================================
// Quote
// =============================================================================

/// The result of pricing one product at one quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Tier unit price for this quantity.
    pub unit_price: Money,
    /// Raw stock counter at quote time.
    pub available_stock: i64,
}

/// Resolves the tier unit price for `quantity` units of `product`.
pub fn quote(product: &Product, quantity: i64) -> Quote {
    let unit_price = if quantity >= product.wholesale_min_qty {
        product.wholesale_price()
    } else {
        product.retail_price()
    };

    Quote {
        unit_price,
        available_stock: product.stock,
    }
}

// =============================================================================
// Cart Pricing
// =============================================================================

/// A cart line ready to become an order line: re-priced and
/// stock-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product: ProductRef,
    /// Product name at pricing time, frozen into the order line.
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// One input to [`price_lines`]: a requested quantity against a product
/// record and its effective availability.
#[derive(Debug, Clone)]
pub struct LineRequest<'a> {
    pub product: &'a Product,
    pub quantity: i64,
    /// Stock minus units committed to open orders.
    pub effective_available: i64,
}

/// Prices a whole cart, all-or-nothing.
///
/// Returns the priced lines and the order total, or fails with
/// `EmptyCart` / `InsufficientStock` on the first line that cannot be
/// covered. Pricing always uses the live product records passed in,
/// never cached cart prices.
pub fn price_lines(requests: &[LineRequest<'_>]) -> CoreResult<(Vec<PricedLine>, Money)> {
    if requests.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(requests.len());
    let mut total = Money::zero();

    for req in requests {
        if req.effective_available < req.quantity {
            return Err(CoreError::InsufficientStock {
                product: req.product.product_ref().to_string(),
                available: req.effective_available.max(0),
                requested: req.quantity,
            });
        }

        let q = quote(req.product, req.quantity);
        let line = PricedLine {
            product: req.product.product_ref(),
            name: req.product.name.clone(),
            quantity: req.quantity,
            unit_price: q.unit_price,
        };

        total += line.line_total();
        lines.push(line);
    }

    Ok((lines, total))
}

// =============================================================================
// Unit Tests
// =============================================================================
