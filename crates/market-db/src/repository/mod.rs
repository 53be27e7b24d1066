//! # Repository Layer
//!
//! One repository per aggregate: product, cart, order, payment.
//!
//! ## Two Kinds of Methods
//! - **Pool methods** (`&self`): single-statement reads and writes that
//!   run on any pooled connection.
//! - **`_tx` associated functions**: take `&mut SqliteConnection` and run
//!   inside a caller-owned transaction (see
//!   [`Database::begin_immediate`](crate::Database::begin_immediate)).
//!   Everything that participates in a read-then-write unit lives here.

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
