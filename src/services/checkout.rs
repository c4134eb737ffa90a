use crate::{
    config::AppConfig,
    entities::{OrderModel, PaymentStatus, PaymentType, ProductSnapshot, User},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{
        CreateSessionRequest, GatewaySession, LineItemMetadata, PaymentGateway, SessionLineItem,
        SessionMetadata, ShippingDetails,
    },
    pricing,
    services::{
        addresses::AddressService,
        orders::{generate_order_token, OrderBatch, OrderLine, OrderService},
    },
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// One submitted cart line. Price, discount and quantity come from the
/// client's populated cart and may be absent on malformed submissions;
/// the COD path only needs the snapshot fields, the session path requires
/// price and quantity.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<i32>,
}

/// Checkout request body shared by the COD and hosted-checkout routes.
/// Fields are optional so each missing piece gets its own validation
/// message instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Option<Vec<CheckoutItem>>,
    #[serde(default)]
    pub sub_total_amt: Option<Decimal>,
    #[serde(default)]
    pub total_amt: Option<Decimal>,
    #[serde(default)]
    pub address_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct ValidatedCheckout {
    pub items: Vec<CheckoutItem>,
    pub sub_total_amt: Decimal,
    pub total_amt: Decimal,
    pub address_id: Uuid,
}

impl CheckoutRequest {
    /// Validates the request shape. Runs before any write.
    pub fn validated(self) -> Result<ValidatedCheckout, ServiceError> {
        let items = match self.items {
            Some(items) if !items.is_empty() => items,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Invalid or empty items in the cart".to_string(),
                ))
            }
        };

        let (sub_total_amt, total_amt, address_id) =
            match (self.sub_total_amt, self.total_amt, self.address_id) {
                (Some(sub), Some(total), Some(address_id)) => (sub, total, address_id),
                _ => {
                    return Err(ServiceError::ValidationError(
                        "Missing required fields: total_amt, sub_total_amt, or address_id"
                            .to_string(),
                    ))
                }
            };

        if sub_total_amt < Decimal::ZERO || total_amt < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Amounts must be non-negative".to_string(),
            ));
        }

        Ok(ValidatedCheckout {
            items,
            sub_total_amt,
            total_amt,
            address_id,
        })
    }
}

/// Orchestrates both checkout paths. COD commits immediately; the online
/// path only builds a gateway session and leaves order creation to the
/// webhook reconciler.
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    addresses: Arc<AddressService>,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        addresses: Arc<AddressService>,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            addresses,
            orders,
            gateway,
            event_sender,
            config,
        }
    }

    /// Cash-on-delivery checkout: builds one PENDING/COD row per submitted
    /// line and commits them with the cart clear in one transaction.
    /// The request-level totals are stamped on every row.
    #[instrument(skip(self, request))]
    pub async fn create_cod_order(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let checkout = request.validated()?;

        self.addresses
            .find_for_user(checkout.address_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let lines = checkout
            .items
            .iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                snapshot: ProductSnapshot {
                    name: item.name.clone(),
                    image: item.image.clone(),
                },
            })
            .collect();

        let batch = OrderBatch {
            user_id,
            order_token: generate_order_token(),
            lines,
            payment_id: String::new(),
            payment_status: PaymentStatus::Pending,
            payment_type: PaymentType::Cod,
            delivery_address: checkout.address_id,
            sub_total_amt: checkout.sub_total_amt,
            total_amt: checkout.total_amt,
        };

        self.orders.commit_order_batch(batch).await
    }

    /// Builds a hosted-checkout session for online payment. Creates no
    /// order row: an abandoned session must never produce a ledger entry.
    /// Order rows for this path are created only by the webhook
    /// reconciler.
    #[instrument(skip(self, request))]
    pub async fn create_payment_session(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let checkout = request.validated()?;

        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let address = self
            .addresses
            .find_for_user(checkout.address_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let mut line_items = Vec::with_capacity(checkout.items.len());
        for item in &checkout.items {
            let price = item.price.ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Item {} is missing a price",
                    item.product_id
                ))
            })?;
            let quantity = match item.quantity {
                Some(quantity) if quantity >= 1 => quantity,
                _ => {
                    return Err(ServiceError::ValidationError(format!(
                        "Item {} must have a quantity of at least 1",
                        item.product_id
                    )))
                }
            };

            let unit_price =
                pricing::discounted_price(price, item.discount.unwrap_or(Decimal::ZERO));
            let unit_amount = pricing::to_minor_units(unit_price).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Item {} price is out of range",
                    item.product_id
                ))
            })?;

            line_items.push(SessionLineItem {
                name: item.name.clone(),
                images: item.image.clone(),
                unit_amount,
                quantity,
                metadata: LineItemMetadata {
                    product_id: item.product_id.to_string(),
                },
            });
        }

        let session_request = CreateSessionRequest {
            mode: "payment".to_string(),
            currency: self.config.currency.clone(),
            customer_email: Some(user.email.clone()),
            line_items,
            metadata: SessionMetadata {
                user_id: user_id.to_string(),
                address_id: checkout.address_id.to_string(),
            },
            shipping: Some(ShippingDetails {
                name: user.name.clone(),
                address_line: address.address_line.clone(),
                city: address.city.clone(),
                postal_code: address.pincode.clone(),
                country: address.country.clone(),
            }),
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.frontend_url.trim_end_matches('/')
            ),
            cancel_url: format!("{}/cancel", self.config.frontend_url.trim_end_matches('/')),
        };

        let session = self.gateway.create_checkout_session(session_request).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                user_id,
                session_id: session.id.clone(),
            })
            .await;

        info!(%user_id, session_id = %session.id, "Created hosted checkout session");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item() -> CheckoutItem {
        CheckoutItem {
            product_id: Uuid::new_v4(),
            name: "Test".to_string(),
            image: vec![],
            price: Some(dec!(100)),
            discount: None,
            quantity: Some(1),
        }
    }

    #[test]
    fn empty_items_are_rejected_with_their_own_message() {
        let err = CheckoutRequest {
            items: Some(vec![]),
            sub_total_amt: Some(dec!(1)),
            total_amt: Some(dec!(1)),
            address_id: Some(Uuid::new_v4()),
        }
        .validated()
        .expect_err("must reject");

        match err {
            ServiceError::ValidationError(msg) => {
                assert_eq!(msg, "Invalid or empty items in the cart")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_totals_or_address_are_rejected_together() {
        for request in [
            CheckoutRequest {
                items: Some(vec![item()]),
                sub_total_amt: None,
                total_amt: Some(dec!(1)),
                address_id: Some(Uuid::new_v4()),
            },
            CheckoutRequest {
                items: Some(vec![item()]),
                sub_total_amt: Some(dec!(1)),
                total_amt: None,
                address_id: Some(Uuid::new_v4()),
            },
            CheckoutRequest {
                items: Some(vec![item()]),
                sub_total_amt: Some(dec!(1)),
                total_amt: Some(dec!(1)),
                address_id: None,
            },
        ] {
            let err = request.validated().expect_err("must reject");
            match err {
                ServiceError::ValidationError(msg) => assert_eq!(
                    msg,
                    "Missing required fields: total_amt, sub_total_amt, or address_id"
                ),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let err = CheckoutRequest {
            items: Some(vec![item()]),
            sub_total_amt: Some(dec!(-1)),
            total_amt: Some(dec!(1)),
            address_id: Some(Uuid::new_v4()),
        }
        .validated()
        .expect_err("must reject");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn valid_request_passes_through() {
        let address_id = Uuid::new_v4();
        let checkout = CheckoutRequest {
            items: Some(vec![item()]),
            sub_total_amt: Some(dec!(500)),
            total_amt: Some(dec!(400)),
            address_id: Some(address_id),
        }
        .validated()
        .expect("valid");

        assert_eq!(checkout.items.len(), 1);
        assert_eq!(checkout.sub_total_amt, dec!(500));
        assert_eq!(checkout.total_amt, dec!(400));
        assert_eq!(checkout.address_id, address_id);
    }
}
