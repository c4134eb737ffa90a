use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{success_response, validate_input},
    services::addresses::{CreateAddressInput, UpdateAddressInput},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{post, put},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("valid regex"));
static MOBILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_address).get(fetch_addresses))
        .route("/:address_id", put(update_address).delete(delete_address))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, message = "address_line is required"))]
    pub address_line: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
    #[validate(regex(path = "PINCODE_RE", message = "Pincode must be 6 digits"))]
    pub pincode: String,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be a 10-digit number"))]
    pub mobile: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[validate(regex(path = "PINCODE_RE", message = "Pincode must be 6 digits"))]
    pub pincode: Option<String>,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be a 10-digit number"))]
    pub mobile: Option<String>,
}

fn parse_mobile(raw: &str) -> Result<i64, ServiceError> {
    raw.parse::<i64>().map_err(|_| {
        ServiceError::ValidationError("Mobile number must be a 10-digit number".to_string())
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/address",
    request_body = CreateAddressRequest,
    responses(
        (status = 200, description = "Address created"),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let mobile = parse_mobile(&payload.mobile)?;

    let address = state
        .services
        .addresses
        .create(
            user.user_id,
            CreateAddressInput {
                address_line: payload.address_line,
                city: payload.city,
                state: payload.state,
                country: payload.country,
                pincode: payload.pincode,
                mobile,
            },
        )
        .await?;

    Ok(success_response(address))
}

#[utoipa::path(
    get,
    path = "/api/v1/address",
    responses(
        (status = 200, description = "Live addresses for the requesting user, newest first"),
        (status = 404, description = "No addresses found", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn fetch_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let addresses = state.services.addresses.list_for_user(user.user_id).await?;

    if addresses.is_empty() {
        return Err(ServiceError::NotFound(
            "No addresses found for this user".to_string(),
        ));
    }

    Ok(success_response(addresses))
}

#[utoipa::path(
    put,
    path = "/api/v1/address/{address_id}",
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated"),
        (status = 404, description = "Address not found or not owned", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address_id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let mobile = payload.mobile.as_deref().map(parse_mobile).transpose()?;

    let address = state
        .services
        .addresses
        .update(
            user.user_id,
            address_id,
            UpdateAddressInput {
                address_line: payload.address_line,
                city: payload.city,
                state: payload.state,
                country: payload.country,
                pincode: payload.pincode,
                mobile,
            },
        )
        .await?;

    Ok(success_response(address))
}

#[utoipa::path(
    delete,
    path = "/api/v1/address/{address_id}",
    responses(
        (status = 200, description = "Address soft-deleted"),
        (status = 404, description = "Address not found or not owned", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .addresses
        .soft_delete(user.user_id, address_id)
        .await?;

    Ok(success_response(serde_json::json!({
        "message": "Address deleted successfully"
    })))
}
