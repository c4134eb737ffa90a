use crate::entities::order::PaymentType;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the services after their writes commit. Consumers
/// are fire-and-forget; losing an event never affects request handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderBatchCommitted {
        user_id: Uuid,
        order_ids: Vec<Uuid>,
        payment_type: PaymentType,
    },

    // Checkout events
    CheckoutSessionCreated {
        user_id: Uuid,
        session_id: String,
    },
    ReconciliationFailed {
        session_id: String,
        reason: String,
    },

    // Cart events
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartItemUpdated {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        user_id: Uuid,
        product_id: Uuid,
    },

    // Address events
    AddressCreated {
        user_id: Uuid,
        address_id: Uuid,
    },
    AddressUpdated(Uuid),
    AddressDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing the failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs instead of failing when the channel is
    /// closed or full. Services use this after their transaction has
    /// already committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Event processing loop. Runs as a background task for the lifetime of
/// the server; reconciliation failures are the operational alert channel
/// for the webhook path and log at error level.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderBatchCommitted {
                user_id,
                ref order_ids,
                payment_type,
            } => {
                info!(
                    %user_id,
                    count = order_ids.len(),
                    ?payment_type,
                    "Order batch committed"
                );
            }
            Event::CheckoutSessionCreated {
                user_id,
                ref session_id,
            } => {
                info!(%user_id, %session_id, "Hosted checkout session created");
            }
            Event::ReconciliationFailed {
                ref session_id,
                ref reason,
            } => {
                error!(
                    %session_id,
                    %reason,
                    "Webhook reconciliation failed; manual intervention required"
                );
            }
            Event::CartItemAdded {
                user_id,
                product_id,
            } => {
                info!(%user_id, %product_id, "Cart item added");
            }
            Event::CartItemUpdated {
                user_id,
                product_id,
                quantity,
            } => {
                info!(%user_id, %product_id, quantity, "Cart item updated");
            }
            Event::CartItemRemoved {
                user_id,
                product_id,
            } => {
                info!(%user_id, %product_id, "Cart item removed");
            }
            Event::AddressCreated {
                user_id,
                address_id,
            } => {
                info!(%user_id, %address_id, "Address created");
            }
            Event::AddressUpdated(address_id) => {
                info!(%address_id, "Address updated");
            }
            Event::AddressDeleted(address_id) => {
                info!(%address_id, "Address soft-deleted");
            }
        }
    }

    info!("Event processing loop stopped");
}
