use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{body, path, query};
use crate::app::AppState;
use crate::database::models::{Student, User};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{self, UserChanges};
use crate::services::Caller;
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub school_id: Option<Uuid>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct ChildRequest {
    pub student_id: Uuid,
}

/// GET /users?school_id=&role=
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<User>> {
    let ListQuery { school_id, role } = query(params)?;
    Ok(ApiResponse::success(users::list(state.store(), &caller, school_id, role).await?))
}

/// PUT /users/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UserChanges>, JsonRejection>,
) -> ApiResult<User> {
    let user = users::update(state.store(), &caller, path(id)?, body(payload)?).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /users/:id
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    users::delete(state.store(), &caller, path(id)?).await?;
    Ok(ApiResponse::success(json!({ "message": "User deleted" })))
}

/// PUT /users/:id/add-child
pub async fn add_child(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ChildRequest>, JsonRejection>,
) -> ApiResult<User> {
    let ChildRequest { student_id } = body(payload)?;
    let parent = users::add_child(state.store(), &caller, path(id)?, student_id).await?;
    Ok(ApiResponse::success(parent))
}

/// PUT /users/:id/remove-child
pub async fn remove_child(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ChildRequest>, JsonRejection>,
) -> ApiResult<User> {
    let ChildRequest { student_id } = body(payload)?;
    let parent = users::remove_child(state.store(), &caller, path(id)?, student_id).await?;
    Ok(ApiResponse::success(parent))
}

/// GET /my-children (parent)
pub async fn my_children(Extension(state): Extension<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Vec<Student>> {
    Ok(ApiResponse::success(users::my_children(state.store(), &caller).await?))
}

/// GET /my-student (student)
pub async fn my_student(Extension(state): Extension<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Student> {
    Ok(ApiResponse::success(users::my_student(state.store(), &caller).await?))
}
