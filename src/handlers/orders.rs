use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::checkout::{CheckoutRequest, OrderDetails},
    ApiResponse, ApiResult, AppState,
};

// POST /orders
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed", body = crate::ApiResponse<OrderDetails>),
        (status = 400, description = "Invalid cart or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or size", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    let Json(request) = payload?;
    let order = state.services.checkout.place_order(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(order).with_message("Order placed")),
    ))
}

// GET /orders/:order_id
#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = crate::ApiResponse<OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    let order = state.services.checkout.details(order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}
