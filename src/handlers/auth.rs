use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};

use super::body;
use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::accounts::{self, LoginRequest, LoginResponse, RegisterRequest};
use crate::services::Caller;

/// POST /auth/login - exchange credentials for a bearer token
pub async fn login(
    Extension(state): Extension<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = body(payload)?;
    Ok(ApiResponse::success(accounts::login(state.store(), request).await?))
}

/// POST /auth/register - create an account (administrators)
pub async fn register(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<User> {
    let request = body(payload)?;
    let user = accounts::register(state.store(), &caller, request).await?;
    Ok(ApiResponse::created(user))
}

/// GET /auth/me - the caller's own account
pub async fn me(Extension(state): Extension<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<User> {
    Ok(ApiResponse::success(accounts::me(state.store(), &caller).await?))
}
