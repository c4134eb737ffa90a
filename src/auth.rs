use crate::{errors::ServiceError, AppState};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claim structure for access tokens. Token issuance happens in a
/// separate identity service; this API only validates.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

pub fn decode_token(token: &str, state: &AppState) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[state.config.auth_issuer.as_str()]);
    validation.set_audience(&[state.config.auth_audience.as_str()]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Authorization header must be a bearer token".to_string())
        })?;

        let claims = decode_token(token.trim(), state)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid subject claim".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
        })
    }
}
