pub mod addresses;
pub mod carts;
pub mod common;
pub mod orders;
pub mod webhooks;

use crate::{
    config::AppConfig,
    events::EventSender,
    gateway::PaymentGateway,
    services::{AddressService, CartService, CheckoutService, OrderService, WebhookReconciler},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregated services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub addresses: Arc<AddressService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let addresses = Arc::new(AddressService::new(db.clone(), event_sender.clone()));
        let carts = Arc::new(CartService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db,
            addresses.clone(),
            orders.clone(),
            gateway.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let reconciler = Arc::new(WebhookReconciler::new(
            orders.clone(),
            gateway,
            event_sender,
            config.payment_webhook_secret.clone(),
            config.payment_webhook_tolerance_secs,
        ));

        Self {
            addresses,
            carts,
            orders,
            checkout,
            reconciler,
        }
    }
}
