use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    entities::order::Model as Order,
    errors::ServiceError,
    gateway::{is_valid_gateway_id, GatewayPayment},
    services::{
        payment_failures::{PaymentFailureReport, RecordPaymentFailure},
        payment_intents::{CreatePaymentIntent, PaymentIntent},
        payment_verification::{VerificationOutcome, VerifyPayment},
    },
    ApiResponse, ApiResult, AppState,
};

// POST /payments/create-order
#[utoipa::path(
    post,
    path = "/payments/create-order",
    request_body = CreatePaymentIntent,
    responses(
        (status = 201, description = "Gateway order created", body = crate::ApiResponse<PaymentIntent>),
        (status = 400, description = "Invalid request or order not payable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway misconfigured or unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentIntent>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentIntent>>), ServiceError> {
    let Json(request) = payload?;
    let intent = state.services.payment_intents.create_intent(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(intent))))
}

// POST /payments/verify
#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyPayment,
    responses(
        (status = 200, description = "Payment verified; order returned", body = crate::ApiResponse<Order>),
        (status = 400, description = "Validation failure or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 401, description = "Signature mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or payment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPayment>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(request) = payload?;
    let outcome = state.services.payment_verification.verify(request).await?;
    let message = match outcome {
        VerificationOutcome::Settled(_) => "Payment verified successfully",
        VerificationOutcome::AlreadyPaid(_) => "Payment already verified",
    };
    Ok(Json(
        ApiResponse::success(outcome.into_order()).with_message(message),
    ))
}

// POST /payments/failure
#[utoipa::path(
    post,
    path = "/payments/failure",
    request_body = RecordPaymentFailure,
    responses(
        (status = 200, description = "Failure recorded and stock restored", body = crate::ApiResponse<PaymentFailureReport>),
        (status = 400, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn record_payment_failure(
    State(state): State<AppState>,
    payload: Result<Json<RecordPaymentFailure>, JsonRejection>,
) -> ApiResult<PaymentFailureReport> {
    let Json(request) = payload?;
    let report = state.services.payment_failures.record_failure(request).await?;
    let message = if report.already_failed {
        "Payment failure already recorded"
    } else {
        "Payment failure recorded"
    };
    Ok(Json(ApiResponse::success(report).with_message(message)))
}

// GET /payments/details/:payment_id
#[utoipa::path(
    get,
    path = "/payments/details/{payment_id}",
    params(
        ("payment_id" = String, Path, description = "Gateway payment id")
    ),
    responses(
        (status = 200, description = "Gateway payment record", body = crate::ApiResponse<GatewayPayment>),
        (status = 400, description = "Malformed payment id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Payment not found at gateway", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway error", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn get_payment_details(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<GatewayPayment> {
    if !is_valid_gateway_id(&payment_id) {
        return Err(ServiceError::ValidationError(
            "paymentId must be a gateway payment id".to_string(),
        ));
    }
    let payment = state.services.gateway.fetch_payment(&payment_id).await?;
    Ok(Json(ApiResponse::success(payment)))
}
