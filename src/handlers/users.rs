use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{services::accounts::AccountDeletion, ApiResponse, ApiResult, AppState};

// DELETE /users/:user_id
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User and owned records deleted", body = crate::ApiResponse<AccountDeletion>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<AccountDeletion> {
    let deletion = state.services.accounts.delete_user(user_id).await?;
    Ok(Json(
        ApiResponse::success(deletion).with_message("User deleted"),
    ))
}
