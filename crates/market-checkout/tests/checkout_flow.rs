//! End-to-end checkout pipeline tests on an in-memory database.
//!
//! Covers the engine's consistency guarantees: atomic checkout, the
//! reservation arithmetic under concurrency, at-most-once stock
//! deduction, and idempotent webhook reconciliation.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use market_checkout::{
    Ack, CartService, CheckoutError, CheckoutService, FulfillmentService, GatewayConfig,
    LogNotifier, PaymentGateway, Reconciler,
};
use market_core::{
    CoreError, Currency, OrderStatus, Payment, PaymentMethod, PaymentStatus, Product, ProductKind,
    ProductRef,
};
use market_db::{Database, DbConfig, DbError};

const WEBHOOK_SECRET: &str = "test-webhook-secret";

// =============================================================================
// Fixtures
// =============================================================================

struct Engine {
    db: Database,
    carts: CartService,
    checkout: CheckoutService,
    fulfillment: FulfillmentService,
    reconciler: Reconciler,
}

async fn engine() -> Engine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let notifier = Arc::new(LogNotifier);

    let carts = CartService::new(db.clone());
    let checkout = CheckoutService::new(db.clone(), notifier.clone());
    let fulfillment = FulfillmentService::new(db.clone(), notifier.clone());
    let reconciler = Reconciler::new(
        db.clone(),
        fulfillment.clone(),
        notifier,
        WEBHOOK_SECRET,
    );

    Engine {
        db,
        carts,
        checkout,
        fulfillment,
        reconciler,
    }
}

async fn seed_product(db: &Database, retail: i64, wholesale: i64, min_qty: i64, stock: i64) -> ProductRef {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        kind: ProductKind::Processor,
        sku: format!("CPU-{}", &Uuid::new_v4().to_string()[..8]),
        name: "Ryzen 5 7600".to_string(),
        brand: "AMD".to_string(),
        retail_price_cents: retail,
        wholesale_price_cents: wholesale,
        wholesale_min_qty: min_qty,
        stock,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    product.product_ref()
}

async fn stock_of(db: &Database, product: &ProductRef) -> i64 {
    db.products().get(product).await.unwrap().unwrap().stock
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn succeeded_event(external_id: &str) -> Vec<u8> {
    format!(
        r#"{{"event":"payment.succeeded","object":{{"id":"{external_id}","status":"succeeded"}}}}"#
    )
    .into_bytes()
}

/// A pending payment with a gateway id already attached, as if
/// create_intent had completed.
async fn seed_payment(db: &Database, order_id: &str, amount_cents: i64, external_id: &str) -> Payment {
    let now = Utc::now();
    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        method: PaymentMethod::BankCard,
        status: PaymentStatus::Pending,
        amount_cents,
        currency: Currency::Rub,
        external_id: Some(external_id.to_string()),
        created_at: now,
        updated_at: now,
    };
    db.payments().insert(&payment).await.unwrap();
    payment
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn checkout_totals_use_live_tier_prices() {
    let e = engine().await;
    // retail 100.00, wholesale 80.00 from 5 units, stock 10
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();

    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    // 3 × retail 100.00 = 300.00
    assert_eq!(order.total_cents, 30_000);
    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(order.order_number, 1);

    let lines = e.db.orders().lines(&order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].unit_price_cents, 10_000);
    assert_eq!(lines[0].quantity, 3);

    // Checkout reserves but does not deduct.
    assert_eq!(stock_of(&e.db, &product).await, 10);

    // Cart is empty, cart row persists.
    let view = e.carts.get("alice").await.unwrap();
    assert!(view.lines.is_empty());
    assert_eq!(view.cart.id, cart.id);
}

#[tokio::test]
async fn checkout_picks_wholesale_at_threshold() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 5).await.unwrap();

    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    assert_eq!(order.total_cents, 5 * 8_000);
}

#[tokio::test]
async fn insufficient_stock_aborts_with_zero_mutation() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 2).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();

    let err = e.checkout.create_order("alice", &cart.id).await.unwrap_err();
    match err {
        CheckoutError::Core(CoreError::InsufficientStock {
            available,
            requested,
            ..
        }) => {
            assert_eq!(available, 2);
            assert_eq!(requested, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    // No order, cart untouched.
    let view = e.carts.get("alice").await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].quantity, 3);
    assert!(e.db.orders().list_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let e = engine().await;
    let cart = e.carts.create_for_user("alice").await.unwrap();

    let err = e.checkout.create_order("alice", &cart.id).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Core(CoreError::EmptyCart)));
}

#[tokio::test]
async fn foreign_cart_is_rejected() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.create_for_user("mallory").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();

    let err = e
        .checkout
        .create_order("mallory", &cart.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Core(CoreError::NotOwned { .. })
    ));

    // Alice's cart is untouched.
    assert_eq!(e.carts.get("alice").await.unwrap().lines.len(), 1);
}

#[tokio::test]
async fn order_numbers_are_monotonic() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();

    e.carts.add_item("alice", &product, 1).await.unwrap();
    let first = e.checkout.create_order("alice", &cart.id).await.unwrap();

    e.carts.add_item("alice", &product, 1).await.unwrap();
    let second = e.checkout.create_order("alice", &cart.id).await.unwrap();

    assert_eq!(first.order_number, 1);
    assert_eq!(second.order_number, 2);
}

#[tokio::test]
async fn concurrent_checkout_of_last_unit_one_wins() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 1).await;

    let alice_cart = e.carts.create_for_user("alice").await.unwrap();
    let bob_cart = e.carts.create_for_user("bob").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    e.carts.add_item("bob", &product, 1).await.unwrap();

    let (a, b) = tokio::join!(
        e.checkout.create_order("alice", &alice_cart.id),
        e.checkout.create_order("bob", &bob_cart.id),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|&&ok| ok).count();
    assert_eq!(successes, 1, "exactly one checkout must win the last unit");

    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(
        loser,
        CheckoutError::Core(CoreError::InsufficientStock { .. })
    ));

    // The counter itself was never touched.
    assert_eq!(stock_of(&e.db, &product).await, 1);
}

// =============================================================================
// Cart Store
// =============================================================================

#[tokio::test]
async fn adding_same_product_merges_into_one_line() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 100).await;

    e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 2).await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();

    let view = e.carts.get("alice").await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].quantity, 5);
    // Merged quantity crossed the wholesale threshold.
    assert_eq!(view.lines[0].unit_price_cents, 8_000);
    assert_eq!(view.subtotal.minor(), 5 * 8_000);
}

#[tokio::test]
async fn change_quantity_to_zero_removes_the_line() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 100).await;

    e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 2).await.unwrap();
    e.carts.change_quantity("alice", &product, 0).await.unwrap();

    assert!(e.carts.get("alice").await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn change_quantity_reprices_the_line() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 100).await;

    e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 2).await.unwrap();
    e.carts.change_quantity("alice", &product, 6).await.unwrap();

    let view = e.carts.get("alice").await.unwrap();
    assert_eq!(view.lines[0].quantity, 6);
    assert_eq!(view.lines[0].unit_price_cents, 8_000);
}

// =============================================================================
// Fulfillment
// =============================================================================

#[tokio::test]
async fn completion_deducts_stock_exactly_once() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    e.fulfillment.mark_paid(&order.id).await.unwrap();
    assert_eq!(stock_of(&e.db, &product).await, 10);

    let completed = e.fulfillment.complete(&order.id).await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert_eq!(stock_of(&e.db, &product).await, 7);

    // Completing again is an invalid transition and deducts nothing.
    let err = e.fulfillment.complete(&order.id).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Core(CoreError::InvalidTransition { .. })
    ));
    assert_eq!(stock_of(&e.db, &product).await, 7);
}

#[tokio::test]
async fn terminal_orders_reject_all_transitions() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    let cancelled = e.fulfillment.cancel(&order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    for attempt in [
        e.fulfillment.mark_paid(&order.id).await,
        e.fulfillment.complete(&order.id).await,
        e.fulfillment.fail(&order.id).await,
        e.fulfillment.cancel(&order.id).await,
    ] {
        assert!(matches!(
            attempt.unwrap_err(),
            CheckoutError::Core(CoreError::InvalidTransition { .. })
        ));
    }
}

#[tokio::test]
async fn completion_of_oversold_order_changes_nothing() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 3).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    e.fulfillment.mark_paid(&order.id).await.unwrap();

    // Stock drained out from under the order (manual correction).
    e.db.products().set_stock(&product, 2).await.unwrap();

    let err = e.fulfillment.complete(&order.id).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Core(CoreError::StockExhausted { .. })
    ));

    // Both halves of the transition rolled back.
    assert_eq!(stock_of(&e.db, &product).await, 2);
    let order = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn cancelled_order_releases_its_reservation() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 1).await;

    let alice_cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &alice_cart.id).await.unwrap();

    // While the order is open the unit is reserved.
    let bob_cart = e.carts.create_for_user("bob").await.unwrap();
    e.carts.add_item("bob", &product, 1).await.unwrap();
    assert!(e.checkout.create_order("bob", &bob_cart.id).await.is_err());

    e.fulfillment.cancel(&order.id).await.unwrap();

    // Cancellation released it; nothing was ever deducted.
    let bob_order = e.checkout.create_order("bob", &bob_cart.id).await.unwrap();
    assert_eq!(bob_order.status, OrderStatus::InProgress);
    assert_eq!(stock_of(&e.db, &product).await, 1);
}

// =============================================================================
// Payments
// =============================================================================

#[tokio::test]
async fn payment_status_is_monotone() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    let payment = seed_payment(&e.db, &order.id, order.total_cents, "ext-mono").await;

    let mut tx = e.db.begin_immediate().await.unwrap();
    market_db::PaymentRepository::update_status_tx(tx.conn(), &payment.id, PaymentStatus::Succeeded)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    // Terminal; the guard refuses any further movement.
    let mut tx = e.db.begin_immediate().await.unwrap();
    let err =
        market_db::PaymentRepository::update_status_tx(tx.conn(), &payment.id, PaymentStatus::Canceled)
            .await
            .unwrap_err();
    tx.rollback().await.unwrap();
    assert!(matches!(err, DbError::GuardFailed { .. }));
}

/// A gateway pointed at an unroutable address. Refusals that happen
/// before the remote call are still observable.
fn offline_gateway(db: &Database) -> PaymentGateway {
    let config = GatewayConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        shop_id: "shop".to_string(),
        secret_key: "sk_test".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        return_url: "http://localhost:3000/checkout/result".to_string(),
        request_timeout: Duration::from_millis(200),
    };
    PaymentGateway::new(config, db.clone()).unwrap()
}

#[tokio::test]
async fn second_intent_while_one_open_is_refused() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    let open = seed_payment(&e.db, &order.id, order.total_cents, "ext-open").await;

    let gateway = offline_gateway(&e.db);
    let err = gateway
        .create_intent(&order.id, PaymentMethod::BankCard)
        .await
        .unwrap_err();

    match err {
        CheckoutError::IntentAlreadyOpen { payment_id, .. } => {
            assert_eq!(payment_id, open.id);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn concurrent_intents_leave_at_most_one_open_attempt() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();

    let gateway = offline_gateway(&e.db);
    let (a, b) = tokio::join!(
        gateway.create_intent(&order.id, PaymentMethod::BankCard),
        gateway.create_intent(&order.id, PaymentMethod::BankCard),
    );

    // The winner records its attempt and fails at the unreachable
    // gateway; the loser must be refused before recording anything.
    let refused = usize::from(matches!(a, Err(CheckoutError::IntentAlreadyOpen { .. })))
        + usize::from(matches!(b, Err(CheckoutError::IntentAlreadyOpen { .. })));
    assert_eq!(refused, 1, "exactly one call must see the open attempt");

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payments WHERE order_id = ?1 AND status = 'pending'",
    )
    .bind(&order.id)
    .fetch_one(e.db.pool())
    .await
    .unwrap();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn intent_refused_when_order_not_awaiting_payment() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    e.fulfillment.cancel(&order.id).await.unwrap();

    let gateway = offline_gateway(&e.db);
    let err = gateway
        .create_intent(&order.id, PaymentMethod::BankCard)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Core(CoreError::InvalidTransition { .. })
    ));
}

// =============================================================================
// Reconciler
// =============================================================================

#[tokio::test]
async fn webhook_drives_order_to_paid_and_duplicates_are_noops() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 3).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    let payment = seed_payment(&e.db, &order.id, order.total_cents, "ext-1").await;

    let body = succeeded_event("ext-1");
    let sig = sign(&body);

    // First delivery: payment succeeded, order paid.
    let ack = e.reconciler.on_callback(&body, &sig).await.unwrap();
    assert_eq!(ack, Ack::Processed);

    let payment = e.db.payments().get(&payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Paid);

    // Redelivery: acknowledged, nothing moves.
    let ack = e.reconciler.on_callback(&body, &sig).await.unwrap();
    assert_eq!(ack, Ack::Duplicate);
    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Paid);

    // Complete once; a further redelivery still deducts nothing.
    e.fulfillment.complete(&order.id).await.unwrap();
    assert_eq!(stock_of(&e.db, &product).await, 7);

    let ack = e.reconciler.on_callback(&body, &sig).await.unwrap();
    assert_eq!(ack, Ack::Duplicate);
    assert_eq!(stock_of(&e.db, &product).await, 7);
}

#[tokio::test]
async fn bad_signature_changes_nothing() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    let payment = seed_payment(&e.db, &order.id, order.total_cents, "ext-2").await;

    let body = succeeded_event("ext-2");

    let err = e
        .reconciler
        .on_callback(&body, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidSignature));

    let payment = e.db.payments().get(&payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::InProgress);
}

#[tokio::test]
async fn unknown_payment_is_rejected_without_creating_rows() {
    let e = engine().await;

    let body = succeeded_event("never-created");
    let sig = sign(&body);

    let err = e.reconciler.on_callback(&body, &sig).await.unwrap_err();
    assert!(matches!(err, CheckoutError::UnknownPayment(_)));
    assert!(e
        .db
        .payments()
        .get_by_external_id("never-created")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn cancelled_payment_fails_the_order() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    let payment = seed_payment(&e.db, &order.id, order.total_cents, "ext-3").await;

    let body =
        br#"{"event":"payment.canceled","object":{"id":"ext-3","status":"canceled"}}"#.to_vec();
    let sig = sign(&body);

    let ack = e.reconciler.on_callback(&body, &sig).await.unwrap();
    assert_eq!(ack, Ack::Processed);

    let payment = e.db.payments().get(&payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);
    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Failed);
}

#[tokio::test]
async fn intermediate_statuses_are_ignored() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    seed_payment(&e.db, &order.id, order.total_cents, "ext-4").await;

    let body = br#"{"event":"payment.waiting_for_capture","object":{"id":"ext-4","status":"waiting_for_capture"}}"#.to_vec();
    let sig = sign(&body);

    let ack = e.reconciler.on_callback(&body, &sig).await.unwrap();
    assert_eq!(ack, Ack::Ignored);

    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::InProgress);
}

#[tokio::test]
async fn succeeded_payment_on_cancelled_order_reports_out_of_sync() {
    let e = engine().await;
    let product = seed_product(&e.db, 10_000, 8_000, 5, 10).await;

    let cart = e.carts.create_for_user("alice").await.unwrap();
    e.carts.add_item("alice", &product, 1).await.unwrap();
    let order = e.checkout.create_order("alice", &cart.id).await.unwrap();
    let payment = seed_payment(&e.db, &order.id, order.total_cents, "ext-5").await;

    // User cancelled while the gateway was confirming.
    e.fulfillment.cancel(&order.id).await.unwrap();

    let body = succeeded_event("ext-5");
    let sig = sign(&body);

    let err = e.reconciler.on_callback(&body, &sig).await.unwrap_err();
    assert!(matches!(err, CheckoutError::OrderOutOfSync { .. }));

    // The payment keeps its money truth; only the order is out of sync.
    let payment = e.db.payments().get(&payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    let order_row = e.db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Cancelled);
}
