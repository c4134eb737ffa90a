use crate::{
    auth::AuthUser,
    entities::{AddressModel, OrderModel},
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::checkout::CheckoutRequest,
    AppState,
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Routes for checkout and the order ledger. The webhook route lives
/// here too so the whole order surface is mounted in one place; it is
/// the single route that consumes its body as raw bytes.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/create/cod", post(create_cod_order))
        .route("/create/checkout-online", post(create_checkout_session))
        .route("/webhook/stripe", post(crate::handlers::webhooks::payment_webhook))
        .route("/fetch", get(fetch_orders))
}

/// An order row with its delivery address populated.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithAddress {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub order: OrderModel,
    #[schema(value_type = Object)]
    pub delivery_address_detail: Option<AddressModel>,
}

/// Cash-on-delivery checkout. Commits the order rows, the user's order
/// history and the cart clear as one transaction.
#[utoipa::path(
    post,
    path = "/api/v1/order/create/cod",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order rows created"),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Commit failed and was rolled back", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_cod_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let orders = state
        .services
        .checkout
        .create_cod_order(user.user_id, payload)
        .await?;

    Ok(created_response(orders))
}

/// Builds a hosted-checkout session and returns the redirect handle.
/// No order row is created here; the webhook reconciler creates them
/// once the gateway reports the session paid.
#[utoipa::path(
    post,
    path = "/api/v1/order/create/checkout-online",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Redirect handle for the hosted checkout"),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway call failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let session = state
        .services
        .checkout
        .create_payment_session(user.user_id, payload)
        .await?;

    Ok(success_response(session))
}

/// The requesting user's orders, newest first, with the delivery address
/// populated.
#[utoipa::path(
    get,
    path = "/api/v1/order/fetch",
    responses(
        (status = 200, description = "Order rows for the requesting user"),
        (status = 404, description = "No orders found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn fetch_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let rows = state.services.orders.list_for_user(user.user_id).await?;

    if rows.is_empty() {
        return Err(ServiceError::NotFound(
            "No orders found for this user".to_string(),
        ));
    }

    let data: Vec<OrderWithAddress> = rows
        .into_iter()
        .map(|(order, address)| OrderWithAddress {
            order,
            delivery_address_detail: address,
        })
        .collect();

    Ok(success_response(data))
}
