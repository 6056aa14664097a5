use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{body, path, query};
use crate::app::AppState;
use crate::database::models::Student;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::students::{self, NewStudent, StudentChanges};
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub school_id: Option<Uuid>,
}

/// GET /students?school_id=
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Student>> {
    let ListQuery { school_id } = query(params)?;
    Ok(ApiResponse::success(students::list(state.store(), &caller, school_id).await?))
}

/// GET /students/:id
pub async fn get(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Student> {
    Ok(ApiResponse::success(students::get(state.store(), &caller, path(id)?).await?))
}

/// GET /students/qr/:code
pub async fn by_qr(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    code: Result<Path<String>, PathRejection>,
) -> ApiResult<Student> {
    let code = path(code)?;
    Ok(ApiResponse::success(students::by_qr(state.store(), &caller, &code).await?))
}

/// POST /students - creates the student and its account
pub async fn create(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewStudent>, JsonRejection>,
) -> ApiResult<Student> {
    let student = students::create(state.store(), &caller, body(payload)?).await?;
    Ok(ApiResponse::created(student))
}

/// PUT /students/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StudentChanges>, JsonRejection>,
) -> ApiResult<Student> {
    let student = students::update(state.store(), &caller, path(id)?, body(payload)?).await?;
    Ok(ApiResponse::success(student))
}

/// DELETE /students/:id
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    students::delete(state.store(), &caller, path(id)?).await?;
    Ok(ApiResponse::success(json!({ "message": "Student deleted" })))
}
