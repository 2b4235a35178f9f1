use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    services::payment_reconciliation::{OrderReconciliation, ReconciliationReport},
    ApiResponse, ApiResult, AppState,
};

// GET /admin/verify-payments
#[utoipa::path(
    get,
    path = "/admin/verify-payments",
    responses(
        (status = 200, description = "Reconciliation report for recent paid orders", body = crate::ApiResponse<ReconciliationReport>),
        (status = 500, description = "Database error", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn verify_payments(State(state): State<AppState>) -> ApiResult<ReconciliationReport> {
    let report = state.services.reconciliation.run().await?;
    Ok(Json(ApiResponse::success(report)))
}

// GET /admin/verify-payments/:order_id
#[utoipa::path(
    get,
    path = "/admin/verify-payments/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Reconciliation result for one order", body = crate::ApiResponse<OrderReconciliation>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn verify_order_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderReconciliation> {
    let result = state.services.reconciliation.verify_order(order_id).await?;
    Ok(Json(ApiResponse::success(result)))
}
