//! # Cart Service
//!
//! Cart store operations with tier-price resolution.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_for_user   one cart per user, at registration                   │
//! │  add_item          resolve tier price, merge into existing line        │
//! │  change_quantity   re-resolve tier price; qty ≤ 0 removes the line     │
//! │  remove_item                                                            │
//! │  clear                                                                  │
//! │  get               lines + subtotal summary                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices captured on cart lines are advisory: checkout re-prices every
//! line against the live catalog. Ownership is enforced on every
//! operation by resolving the cart through the acting user.

use serde::{Deserialize, Serialize};
use tracing::debug;

use market_core::{
    pricing, validation, Cart, CartLine, CoreError, Money, Product, ProductRef,
};
use market_db::Database;

use crate::error::{CheckoutError, CheckoutResult};

/// A cart with its lines and a subtotal at captured prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

/// Cart store operations.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
}

impl CartService {
    pub fn new(db: Database) -> Self {
        CartService { db }
    }

    /// Creates the user's cart. Called once, at registration.
    pub async fn create_for_user(&self, user_id: &str) -> CheckoutResult<Cart> {
        let cart = self.db.carts().create(user_id).await?;
        Ok(cart)
    }

    /// Adds quantity of a product, merging into an existing line.
    ///
    /// The captured unit price is the tier price for the *merged*
    /// quantity, so crossing the wholesale threshold by adding more
    /// units re-prices the whole line.
    pub async fn add_item(
        &self,
        user_id: &str,
        product_ref: &ProductRef,
        quantity: i64,
    ) -> CheckoutResult<()> {
        validation::validate_quantity(quantity).map_err(CoreError::from)?;

        let cart = self.cart_of(user_id).await?;
        let product = self.product(product_ref).await?;

        let existing = self
            .db
            .carts()
            .lines(&cart.id)
            .await?
            .into_iter()
            .find(|l| &l.product_ref() == product_ref)
            .map(|l| l.quantity)
            .unwrap_or(0);

        let merged = existing + quantity;
        validation::validate_quantity(merged).map_err(CoreError::from)?;

        let unit_price = pricing::quote(&product, merged).unit_price;

        debug!(
            cart_id = %cart.id,
            product = %product_ref,
            quantity,
            merged,
            unit_price = %unit_price,
            "Adding cart item"
        );

        // The UNIQUE index merges the quantity; the captured price is
        // replaced with the one resolved for the merged quantity.
        self.db
            .carts()
            .upsert_line(&cart.id, product_ref, quantity, unit_price.minor())
            .await?;

        Ok(())
    }

    /// Replaces the quantity of a line. Quantity ≤ 0 removes the line.
    pub async fn change_quantity(
        &self,
        user_id: &str,
        product_ref: &ProductRef,
        quantity: i64,
    ) -> CheckoutResult<()> {
        let cart = self.cart_of(user_id).await?;

        if quantity <= 0 {
            self.db.carts().remove_line(&cart.id, product_ref).await?;
            return Ok(());
        }

        validation::validate_quantity(quantity).map_err(CoreError::from)?;

        let product = self.product(product_ref).await?;
        let unit_price = pricing::quote(&product, quantity).unit_price;

        self.db
            .carts()
            .set_line_quantity(&cart.id, product_ref, quantity, unit_price.minor())
            .await?;

        Ok(())
    }

    /// Removes one line.
    pub async fn remove_item(&self, user_id: &str, product_ref: &ProductRef) -> CheckoutResult<()> {
        let cart = self.cart_of(user_id).await?;
        self.db.carts().remove_line(&cart.id, product_ref).await?;
        Ok(())
    }

    /// Removes all lines. The cart row persists.
    pub async fn clear(&self, user_id: &str) -> CheckoutResult<()> {
        let cart = self.cart_of(user_id).await?;
        self.db.carts().clear(&cart.id).await?;
        Ok(())
    }

    /// The user's cart with its lines and subtotal at captured prices.
    pub async fn get(&self, user_id: &str) -> CheckoutResult<CartView> {
        let cart = self.cart_of(user_id).await?;
        let lines = self.db.carts().lines(&cart.id).await?;

        let mut subtotal = Money::zero();
        for line in &lines {
            subtotal += line.subtotal();
        }

        Ok(CartView {
            cart,
            lines,
            subtotal,
        })
    }

    async fn cart_of(&self, user_id: &str) -> CheckoutResult<Cart> {
        self.db
            .carts()
            .get_by_user(user_id)
            .await?
            .ok_or_else(|| CheckoutError::CartNotFound(user_id.to_string()))
    }

    async fn product(&self, product_ref: &ProductRef) -> CheckoutResult<Product> {
        let product = self
            .db
            .products()
            .get(product_ref)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_ref.to_string()))?;
        Ok(product)
    }
}
