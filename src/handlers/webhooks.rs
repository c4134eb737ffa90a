use crate::{errors::ServiceError, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;

/// Payment gateway webhook endpoint.
///
/// The body is consumed as raw bytes because the signature covers the
/// exact wire bytes; this is the one route that must bypass JSON body
/// parsing. Signature failure is the only 400; once the signature
/// passes, the delivery is acknowledged with 200 regardless of the
/// reconciliation outcome, so the gateway never redelivers an event whose
/// commit partially succeeded (redelivery here has no idempotency guard
/// and would duplicate orders). Failures surface on the operational log
/// channel instead.
#[utoipa::path(
    post,
    path = "/api/v1/order/webhook/stripe",
    request_body = String,
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Signature verification failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    state.services.reconciler.verify(&headers, &body)?;

    // Outcome is logged by the reconciler; the gateway only needs the ack.
    let _outcome = state.services.reconciler.reconcile(&body).await;

    Ok((StatusCode::OK, Json(json!({ "received": true }))).into_response())
}
