//! # Payment Reconciler
//!
//! Idempotent, signature-verified webhook handling.
//!
//! ## Callback Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  on_callback(raw_body, signature_header)                               │
//! │                                                                         │
//! │  1. HMAC-SHA256(raw body, webhook secret), base64, constant-time       │
//! │     compare → InvalidSignature, zero state change                      │
//! │  2. Parse {event, object:{id, status}}                                 │
//! │  3. Look up Payment by external id → UnknownPayment (never create)     │
//! │  4. Payment already terminal → Ack::Duplicate, no-op                   │
//! │  5. Update payment (guarded on pending), then drive the order:         │
//! │        succeeded → order paid                                          │
//! │        canceled  → order failed (best effort)                          │
//! │                                                                         │
//! │  Payment update and order transition are two consecutive               │
//! │  transactions, payment first: a failed order transition must not       │
//! │  be able to roll the payment back. That failure surfaces as            │
//! │  OrderOutOfSync and is logged at error level.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once and possibly out of order; every path here
//! is safe to re-enter and side effects happen exactly once.

use std::sync::Arc;

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info, warn};

use market_core::PaymentStatus;
use market_db::{Database, DbError, PaymentRepository};

use crate::error::{CheckoutError, CheckoutResult};
use crate::fulfillment::FulfillmentService;
use crate::notify::Notifier;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Signature Verification
// =============================================================================

/// Verifies the `X-Request-Signature-SHA256` header against the raw
/// request body.
///
/// The header carries base64(HMAC-SHA256(body, secret)). Comparison is
/// constant-time via `Mac::verify_slice`.
pub fn verify_signature(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature_header.trim())
    else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);

    mac.verify_slice(&expected).is_ok()
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[allow(dead_code)]
    event: String,
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    /// Gateway-side payment id.
    id: String,
    /// Reported payment status.
    status: String,
}

// =============================================================================
// Ack
// =============================================================================

/// How a callback was handled. Every variant is a 200 to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Payment (and order) were updated.
    Processed,
    /// Re-delivery of an already-applied event; nothing changed.
    Duplicate,
    /// Intermediate status the engine does not act on.
    Ignored,
}

// =============================================================================
// Reconciler
// =============================================================================

/// Processes payment status callbacks from the gateway.
#[derive(Clone)]
pub struct Reconciler {
    db: Database,
    fulfillment: FulfillmentService,
    notifier: Arc<dyn Notifier>,
    webhook_secret: String,
}

impl Reconciler {
    pub fn new(
        db: Database,
        fulfillment: FulfillmentService,
        notifier: Arc<dyn Notifier>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Reconciler {
            db,
            fulfillment,
            notifier,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Handles one webhook delivery.
    ///
    /// Returns `Ok(Ack)` when the gateway should receive a 200; any
    /// error means non-ack, and the gateway will retry — which the
    /// idempotency rules above make safe.
    pub async fn on_callback(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> CheckoutResult<Ack> {
        if !verify_signature(raw_body, signature_header, &self.webhook_secret) {
            warn!("Webhook signature rejected");
            return Err(CheckoutError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| CheckoutError::MalformedCallback(e.to_string()))?;

        let payment = self
            .db
            .payments()
            .get_by_external_id(&event.object.id)
            .await?
            .ok_or_else(|| CheckoutError::UnknownPayment(event.object.id.clone()))?;

        if payment.status.is_terminal() {
            info!(
                payment_id = %payment.id,
                external_id = %event.object.id,
                "Duplicate webhook delivery ignored"
            );
            return Ok(Ack::Duplicate);
        }

        let reported = match event.object.status.as_str() {
            "succeeded" => PaymentStatus::Succeeded,
            "canceled" => PaymentStatus::Canceled,
            other => {
                info!(status = %other, "Ignoring intermediate payment status");
                return Ok(Ack::Ignored);
            }
        };

        // Transaction 1: the payment itself, guarded on pending. A
        // concurrent delivery of the same event loses the guard and is
        // acknowledged as a duplicate.
        match self.apply_payment_status(&payment.id, reported).await {
            Ok(()) => {}
            Err(CheckoutError::Db(DbError::GuardFailed { .. })) => {
                return Ok(Ack::Duplicate);
            }
            Err(e) => return Err(e),
        }

        // Transaction 2: the order. Must not be able to undo the payment
        // update above.
        match reported {
            PaymentStatus::Succeeded => {
                if let Err(e) = self.fulfillment.mark_paid(&payment.order_id).await {
                    error!(
                        order_id = %payment.order_id,
                        payment_id = %payment.id,
                        error = %e,
                        "Payment succeeded but order could not be marked paid"
                    );
                    return Err(CheckoutError::OrderOutOfSync {
                        order_id: payment.order_id.clone(),
                        payment_id: payment.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            PaymentStatus::Canceled => {
                self.notifier.payment_failed(&payment);
                // Best effort: the order may legitimately be elsewhere
                // already (cancelled by the user, or paid through a
                // later attempt).
                if let Err(e) = self.fulfillment.fail(&payment.order_id).await {
                    warn!(
                        order_id = %payment.order_id,
                        payment_id = %payment.id,
                        error = %e,
                        "Cancelled payment; order not moved to failed"
                    );
                }
            }
            PaymentStatus::Pending => unreachable!("pending filtered above"),
        }

        info!(
            payment_id = %payment.id,
            status = %reported,
            "Webhook reconciled"
        );
        Ok(Ack::Processed)
    }

    async fn apply_payment_status(
        &self,
        payment_id: &str,
        to: PaymentStatus,
    ) -> CheckoutResult<()> {
        let mut tx = self.db.begin_immediate().await?;

        match PaymentRepository::update_status_tx(tx.conn(), payment_id, to).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e.into())
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
