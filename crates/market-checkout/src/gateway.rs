//! # Payment Gateway Adapter
//!
//! Creates payment intents at the external processor.
//!
//! ## Intent Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_intent(order, method)                                          │
//! │       │                                                                 │
//! │       ├── ONE IMMEDIATE TRANSACTION:                                   │
//! │       │        refuse unless the order is awaiting payment             │
//! │       │        refuse if an open (pending) attempt already exists      │
//! │       │        INSERT local Payment row (pending, no external id)      │
//! │       │        └── committed before the remote call: a crash or        │
//! │       │            timeout still leaves a row to reconcile against     │
//! │       │                                                                 │
//! │       ├── POST {base}/payments                                         │
//! │       │        Idempotence-Key: fresh UUID v4 per call                 │
//! │       │        basic auth (shop id / secret key)                       │
//! │       │        short request timeout, NEVER silently retried           │
//! │       │                                                                 │
//! │       ├── on failure: pending row stays, ExternalGatewayError          │
//! │       │                                                                 │
//! │       └── on success: persist gateway id, return confirmation URL      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use market_core::{
    validation, CoreError, Order, OrderStatus, Payment, PaymentMethod, PaymentStatus,
};
use market_db::{Database, OrderRepository, PaymentRepository};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Configuration
// =============================================================================

/// Payment gateway configuration.
///
/// Loaded from environment variables with fallback to defaults where a
/// default is safe. Credentials are always required.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL.
    pub base_url: String,

    /// Shop identifier (basic auth username).
    pub shop_id: String,

    /// API secret key (basic auth password).
    pub secret_key: String,

    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,

    /// Where the gateway redirects the customer after checkout.
    pub return_url: String,

    /// Outbound request timeout.
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, CheckoutError> {
        let config = GatewayConfig {
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.yookassa.ru/v3".to_string()),

            shop_id: env::var("GATEWAY_SHOP_ID")
                .map_err(|_| CheckoutError::Config("GATEWAY_SHOP_ID is required".to_string()))?,

            secret_key: env::var("GATEWAY_SECRET_KEY").map_err(|_| {
                CheckoutError::Config("GATEWAY_SECRET_KEY is required".to_string())
            })?,

            webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET").map_err(|_| {
                CheckoutError::Config("GATEWAY_WEBHOOK_SECRET is required".to_string())
            })?,

            return_url: env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/result".to_string()),

            request_timeout: Duration::from_secs(
                env::var("GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|_| {
                        CheckoutError::Config("Invalid value for GATEWAY_TIMEOUT_SECS".to_string())
                    })?,
            ),
        };

        Ok(config)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct WireAmount {
    /// Two-decimal string, e.g. "300.00".
    value: String,
    currency: String,
}

#[derive(Debug, Serialize)]
struct WireMethodData {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct WireConfirmation {
    #[serde(rename = "type")]
    kind: String,
    return_url: String,
}

#[derive(Debug, Serialize)]
struct WireMetadata {
    order_id: String,
}

#[derive(Debug, Serialize)]
struct CreateIntentRequest {
    amount: WireAmount,
    payment_method_data: WireMethodData,
    confirmation: WireConfirmation,
    description: String,
    metadata: WireMetadata,
}

#[derive(Debug, Deserialize)]
struct CreateIntentResponse {
    id: String,
    confirmation: ConfirmationResponse,
}

#[derive(Debug, Deserialize)]
struct ConfirmationResponse {
    confirmation_url: String,
}

// =============================================================================
// Intent
// =============================================================================

/// The result of creating a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Local payment id.
    pub payment_id: String,
    /// Gateway-assigned payment id.
    pub external_id: String,
    /// Where to send the customer to complete payment.
    pub confirmation_url: String,
}

// =============================================================================
// Gateway
// =============================================================================

/// Adapter for the external payment processor.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    db: Database,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig, db: Database) -> CheckoutResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CheckoutError::ExternalGatewayError(e.to_string()))?;

        Ok(PaymentGateway { config, client, db })
    }

    /// The webhook secret, shared with the reconciler.
    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    /// Creates a payment intent for an order.
    ///
    /// Refuses when the order is not awaiting payment or already has an
    /// open attempt. The outbound call carries a fresh `Idempotence-Key`
    /// per call — reusing a key after a local failure could resurrect a
    /// half-known remote state, and retrying without one could
    /// double-charge, so failures are surfaced instead.
    pub async fn create_intent(
        &self,
        order_id: &str,
        method: PaymentMethod,
    ) -> CheckoutResult<PaymentIntent> {
        // Status check, open-attempt check and the pending insert are one
        // read-then-write unit; two concurrent calls for the same order
        // serialize here and the loser sees the winner's open row. The
        // pending row commits *before* the remote call: if the process
        // dies mid-call, reconciliation still has something to attach the
        // gateway's answer to.
        let mut tx = self.db.begin_immediate().await?;

        let result = Self::open_attempt_tx(tx.conn(), order_id, method).await;

        let (order, payment) = match result {
            Ok(pair) => {
                tx.commit().await?;
                pair
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        let request = CreateIntentRequest {
            amount: WireAmount {
                value: order.total().to_decimal_string(),
                currency: order.currency.code().to_string(),
            },
            payment_method_data: WireMethodData {
                kind: method.wire_name().to_string(),
            },
            confirmation: WireConfirmation {
                kind: "redirect".to_string(),
                return_url: self.config.return_url.clone(),
            },
            description: format!("Order #{}", order.order_number),
            metadata: WireMetadata {
                order_id: order.id.clone(),
            },
        };

        let idempotence_key = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(format!("{}/payments", self.config.base_url))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header("Idempotence-Key", &idempotence_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(order_id = %order_id, error = %e, "Gateway request failed");
                CheckoutError::ExternalGatewayError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(order_id = %order_id, %status, "Gateway rejected intent");
            return Err(CheckoutError::ExternalGatewayError(format!(
                "gateway returned {status}: {body}"
            )));
        }

        let reply: CreateIntentResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::ExternalGatewayError(e.to_string()))?;

        self.db
            .payments()
            .set_external_id(&payment.id, &reply.id)
            .await?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            external_id = %reply.id,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            payment_id: payment.id,
            external_id: reply.id,
            confirmation_url: reply.confirmation.confirmation_url,
        })
    }

    /// Verifies the order is awaiting payment with no open attempt, then
    /// records the new pending attempt. The partial unique index on open
    /// payments backs the check at the schema level.
    async fn open_attempt_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
        method: PaymentMethod,
    ) -> CheckoutResult<(Order, Payment)> {
        let order = OrderRepository::get_tx(conn, order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))?;

        if order.status != OrderStatus::InProgress {
            return Err(CoreError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Paid.to_string(),
            }
            .into());
        }

        if let Some(open) = PaymentRepository::open_for_order_tx(conn, order_id).await? {
            return Err(CheckoutError::IntentAlreadyOpen {
                order_id: order_id.to_string(),
                payment_id: open.id,
            });
        }

        validation::validate_payment_amount(order.total_cents).map_err(CoreError::from)?;

        let now = chrono::Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            method,
            status: PaymentStatus::Pending,
            amount_cents: order.total_cents,
            currency: order.currency,
            external_id: None,
            created_at: now,
            updated_at: now,
        };
        PaymentRepository::insert_tx(conn, &payment).await?;

        Ok((order, payment))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::Money;

    #[test]
    fn test_intent_request_wire_shape() {
        let request = CreateIntentRequest {
            amount: WireAmount {
                value: Money::from_minor(30000).to_decimal_string(),
                currency: "RUB".to_string(),
            },
            payment_method_data: WireMethodData {
                kind: PaymentMethod::BankCard.wire_name().to_string(),
            },
            confirmation: WireConfirmation {
                kind: "redirect".to_string(),
                return_url: "http://localhost:3000/checkout/result".to_string(),
            },
            description: "Order #42".to_string(),
            metadata: WireMetadata {
                order_id: "order-1".to_string(),
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"]["value"], "300.00");
        assert_eq!(json["amount"]["currency"], "RUB");
        assert_eq!(json["payment_method_data"]["type"], "bank_card");
        assert_eq!(json["confirmation"]["type"], "redirect");
        assert_eq!(json["metadata"]["order_id"], "order-1");
    }

    #[test]
    fn test_intent_response_parses() {
        let body = r#"{
            "id": "2d8f7a1c-000f-5000-9000-1b1c2d3e4f5a",
            "status": "pending",
            "confirmation": {
                "type": "redirect",
                "confirmation_url": "https://gateway.example/confirm/abc"
            }
        }"#;

        let reply: CreateIntentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(reply.id, "2d8f7a1c-000f-5000-9000-1b1c2d3e4f5a");
        assert_eq!(
            reply.confirmation.confirmation_url,
            "https://gateway.example/confirm/abc"
        );
    }
}
