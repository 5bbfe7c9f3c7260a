//! Handler functions for user management endpoints.
//!
//! Role-gated operations live here, not in the access gate: the gate only
//! authenticates, each handler checks the attached identity itself.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::{UpdateStatusRequest, UserInfo};
use crate::database::models::Role;
use crate::errors::ServiceError;
use crate::repositories::user_repository::UserRepository;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::Json as ResponseJson,
};
use sqlx::SqlitePool;
use validator::Validate;

/// Set the free-form account status flag on a user. Operator only.
#[axum::debug_handler]
pub async fn update_status(
    Extension(pool): Extension<SqlitePool>,
    Extension(current_user): Extension<UserInfo>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<ResponseJson<ApiResponse<UserInfo>>, (StatusCode, String)> {
    if let Err(errors) = payload.validate() {
        return Err(service_error_to_http(
            ServiceError::from_validation_errors(errors),
        ));
    }

    if current_user.role != Role::Admin {
        return Err(service_error_to_http(ServiceError::forbidden(
            "Administrator role required",
        )));
    }

    let repo = UserRepository::new(&pool);
    match repo.set_status(&payload.user_id, &payload.status).await {
        Ok(Some(user)) => Ok(ResponseJson(ApiResponse::success(
            UserInfo::from(&user),
            "Status updated",
        ))),
        Ok(None) => Err(service_error_to_http(ServiceError::not_found(
            "No account found for this user id",
        ))),
        Err(e) => Err(service_error_to_http(ServiceError::from(e))),
    }
}
