use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;

use crate::{services::payment_webhooks::WebhookOutcome, ApiResponse, ApiResult, AppState};

/// Header carrying the hex HMAC of the raw body
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

// POST /payments/webhook
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = String,
    params(
        ("x-razorpay-signature" = String, Header, description = "HMAC-SHA256 of the raw body")
    ),
    responses(
        (status = 200, description = "Webhook acknowledged", body = crate::ApiResponse<WebhookOutcome>),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookOutcome> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .services
        .payment_webhooks
        .handle(&body, signature)
        .await?;

    Ok(Json(
        ApiResponse::success(outcome).with_message("Webhook processed"),
    ))
}
