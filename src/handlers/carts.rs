use crate::{
    auth::AuthUser,
    entities::{CartItemModel, ProductModel},
    errors::ServiceError,
    handlers::common::{success_response, validate_input},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(fetch_cart_items))
        .route(
            "/items/:product_id",
            post(add_cart_item)
                .put(update_cart_item)
                .delete(remove_cart_item),
        )
}

/// A cart line with the live product populated.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub item: CartItemModel,
    #[schema(value_type = Object)]
    pub product: Option<ProductModel>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items/{product_id}",
    responses(
        (status = 200, description = "Item added at quantity 1"),
        (status = 400, description = "Item already in cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let item = state
        .services
        .carts
        .add_item(user.user_id, product_id)
        .await?;

    Ok(success_response(item))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/items",
    responses((status = 200, description = "Cart lines with products populated")),
    tag = "Cart"
)]
pub async fn fetch_cart_items(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let lines = state.services.carts.list_for_user(user.user_id).await?;

    let data: Vec<CartLineResponse> = lines
        .into_iter()
        .map(|(item, product)| CartLineResponse { item, product })
        .collect();

    Ok(success_response(data))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated"),
        (status = 400, description = "Quantity below 1", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let item = state
        .services
        .carts
        .update_quantity(user.user_id, product_id, payload.quantity)
        .await?;

    Ok(success_response(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{product_id}",
    responses(
        (status = 200, description = "Item removed"),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let item = state
        .services
        .carts
        .remove_item(user.user_id, product_id)
        .await?;

    Ok(success_response(item))
}
