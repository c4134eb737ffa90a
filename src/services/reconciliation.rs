use crate::{
    entities::{OrderModel, PaymentStatus, PaymentType, ProductSnapshot},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{signature, PaymentGateway, WebhookEvent},
    services::orders::{generate_order_token, OrderBatch, OrderLine, OrderService},
};
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const CHECKOUT_EXPIRED: &str = "checkout.session.expired";
const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Terminal state of one webhook delivery. Every signature-valid event is
/// acknowledged to the gateway regardless of which state it lands in;
/// `Failed` is surfaced on the operational log channel only. There is no
/// retry from within this system.
#[derive(Debug)]
pub enum ReconciliationOutcome {
    /// Not a completed checkout, or the session is not paid. A no-op.
    Ignored { reason: String },
    /// Order rows committed from the gateway's record of the session.
    Reconciled { orders: Vec<OrderModel> },
    /// Signature was valid but reconciliation could not commit. The user
    /// has paid and sees no order; requires manual intervention.
    Failed { session_id: String, reason: String },
}

/// Consumes the gateway event stream and converges on the same atomic
/// order commit the COD path uses. The gateway's own session record, not
/// the client's original request, is the source of truth for line items
/// and amounts.
pub struct WebhookReconciler {
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    webhook_secret: String,
    tolerance_secs: Option<u64>,
}

impl WebhookReconciler {
    pub fn new(
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        webhook_secret: String,
        tolerance_secs: Option<u64>,
    ) -> Self {
        Self {
            orders,
            gateway,
            event_sender,
            webhook_secret,
            tolerance_secs,
        }
    }

    /// Verifies the event signature over the raw body bytes. This is the
    /// only authentication on the webhook endpoint and it fails closed.
    pub fn verify(&self, headers: &HeaderMap, payload: &[u8]) -> Result<(), ServiceError> {
        signature::verify_signature(headers, payload, &self.webhook_secret, self.tolerance_secs)
    }

    /// Runs the state machine on a signature-verified payload. Never
    /// returns an error: every failure becomes a `Failed` outcome so the
    /// HTTP layer can acknowledge the delivery either way.
    #[instrument(skip(self, payload))]
    pub async fn reconcile(&self, payload: &[u8]) -> ReconciliationOutcome {
        let event: WebhookEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                return self
                    .failed("unknown".to_string(), format!("unparseable event: {}", e))
                    .await
            }
        };

        match event.event_type.as_str() {
            CHECKOUT_COMPLETED => {}
            CHECKOUT_EXPIRED => {
                warn!(session_id = %event.data.object.id, "Checkout session expired");
                return ReconciliationOutcome::Ignored {
                    reason: format!("session expired: {}", event.data.object.id),
                };
            }
            PAYMENT_FAILED => {
                warn!(event_id = %event.id, "Payment failed");
                return ReconciliationOutcome::Ignored {
                    reason: "payment failed".to_string(),
                };
            }
            other => {
                info!(event_type = %other, "Unhandled webhook event type");
                return ReconciliationOutcome::Ignored {
                    reason: format!("unhandled event type: {}", other),
                };
            }
        }

        let session = event.data.object;

        // Covers processing/unpaid intermediate states; the gateway will
        // send another event once the session actually settles.
        if session.payment_status != "paid" {
            info!(
                session_id = %session.id,
                payment_status = %session.payment_status,
                "Session not paid; nothing to reconcile"
            );
            return ReconciliationOutcome::Ignored {
                reason: format!("payment_status is {}", session.payment_status),
            };
        }

        // The session metadata is the only thread connecting this event
        // back to a user and address; without it the event is malformed.
        let user_id = match session
            .metadata
            .get("user_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(id) => id,
            None => {
                return self
                    .failed(session.id, "missing or invalid user_id metadata".to_string())
                    .await
            }
        };
        let address_id = match session
            .metadata
            .get("address_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(id) => id,
            None => {
                return self
                    .failed(
                        session.id,
                        "missing or invalid address_id metadata".to_string(),
                    )
                    .await
            }
        };

        // Authoritative line items: the gateway's record of the session,
        // immune to a client that mutated its cart after session creation.
        let line_items = match self.gateway.list_line_items(&session.id).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                return self
                    .failed(session.id, "no line items returned for session".to_string())
                    .await
            }
            Err(e) => return self.failed(session.id, format!("line item fetch: {}", e)).await,
        };

        let mut lines = Vec::with_capacity(line_items.len());
        for item in &line_items {
            let product_id = match item
                .product
                .metadata
                .get("product_id")
                .and_then(|raw| Uuid::parse_str(raw).ok())
            {
                Some(id) => id,
                None => {
                    return self
                        .failed(
                            session.id,
                            "line item missing product_id metadata".to_string(),
                        )
                        .await
                }
            };

            let name = item
                .description
                .clone()
                .or_else(|| item.product.name.clone())
                .unwrap_or_default();

            lines.push(OrderLine {
                product_id,
                snapshot: ProductSnapshot {
                    name,
                    image: item.product.images.clone(),
                },
            });
        }

        // Settled amounts come from the session itself, never recomputed
        // locally.
        let (sub_total_amt, total_amt) = match (session.amount_subtotal, session.amount_total) {
            (Some(sub), Some(total)) => (Decimal::new(sub, 2), Decimal::new(total, 2)),
            _ => {
                return self
                    .failed(session.id, "session amounts missing".to_string())
                    .await
            }
        };

        let batch = OrderBatch {
            user_id,
            order_token: generate_order_token(),
            lines,
            payment_id: session.payment_intent.clone().unwrap_or_default(),
            payment_status: map_settlement_status(&session.payment_status),
            payment_type: PaymentType::Online,
            delivery_address: address_id,
            sub_total_amt,
            total_amt,
        };

        match self.orders.commit_order_batch(batch).await {
            Ok(orders) => {
                info!(
                    session_id = %session.id,
                    rows = orders.len(),
                    "Reconciled paid session into order ledger"
                );
                ReconciliationOutcome::Reconciled { orders }
            }
            Err(e) => self.failed(session.id, format!("order commit: {}", e)).await,
        }
    }

    async fn failed(&self, session_id: String, reason: String) -> ReconciliationOutcome {
        error!(%session_id, %reason, "Webhook reconciliation failed");
        self.event_sender
            .send_or_log(Event::ReconciliationFailed {
                session_id: session_id.clone(),
                reason: reason.clone(),
            })
            .await;
        ReconciliationOutcome::Failed { session_id, reason }
    }
}

/// The gateway's settlement status, uppercased onto the ledger enum.
fn map_settlement_status(status: &str) -> PaymentStatus {
    match status.to_ascii_uppercase().as_str() {
        "PAID" => PaymentStatus::Paid,
        "FAILED" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_status_maps_uppercased() {
        assert_eq!(map_settlement_status("paid"), PaymentStatus::Paid);
        assert_eq!(map_settlement_status("PAID"), PaymentStatus::Paid);
        assert_eq!(map_settlement_status("failed"), PaymentStatus::Failed);
        assert_eq!(map_settlement_status("unpaid"), PaymentStatus::Pending);
        assert_eq!(map_settlement_status("processing"), PaymentStatus::Pending);
    }
}
