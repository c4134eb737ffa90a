//! Hosted-checkout payment gateway client.
//!
//! The gateway is the source of truth for settled line items and amounts:
//! after a session completes, the reconciler reads the gateway's own
//! record of the session rather than anything the client submitted.

pub mod signature;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

/// Per-line metadata attached when the session is created. `product_id`
/// is the only thread by which the webhook recovers which product a
/// settled line item refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemMetadata {
    pub product_id: String,
}

/// A priced line item submitted to the gateway. `unit_amount` is in minor
/// currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub unit_amount: i64,
    pub quantity: i32,
    pub metadata: LineItemMetadata,
}

/// Session-level metadata. These two identifiers must survive the round
/// trip through the gateway unmodified; they are all the webhook has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_id: String,
    pub address_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub mode: String,
    pub currency: String,
    pub customer_email: Option<String>,
    pub line_items: Vec<SessionLineItem>,
    pub metadata: SessionMetadata,
    pub shipping: Option<ShippingDetails>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Redirect handle returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

/// The gateway's record of a settled line item, with the product expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledLineItem {
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i32,
    pub product: SettledProduct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledProduct {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Webhook event envelope as delivered by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: CheckoutSessionObject,
}

/// The gateway's view of a checkout session as carried in webhook events.
/// Amounts are in minor currency units.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub payment_status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Seam between checkout/reconciliation and the gateway's REST API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session and returns the redirect handle.
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError>;

    /// Fetches the gateway's own record of a session's line items.
    async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SettledLineItem>, ServiceError>;
}

/// REST implementation over the gateway's API.
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LineItemsResponse {
    data: Vec<SettledLineItem>,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request))]
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("session create failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayError(format!(
                "session create returned {}",
                response.status()
            )));
        }

        response
            .json::<GatewaySession>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("invalid session response: {}", e)))
    }

    #[instrument(skip(self))]
    async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SettledLineItem>, ServiceError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}/line_items?expand=product",
            self.base_url, session_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("line item fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayError(format!(
                "line item fetch returned {}",
                response.status()
            )));
        }

        let body = response
            .json::<LineItemsResponse>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("invalid line item response: {}", e)))?;

        Ok(body.data)
    }
}
