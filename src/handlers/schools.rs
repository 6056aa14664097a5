use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{body, path, query};
use crate::app::AppState;
use crate::database::models::School;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::schools::{self, SchoolInput};
use crate::services::visibility::SchoolQuery;
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub city: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub district_admin_id: Uuid,
}

/// GET /schools?city=&search=
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<School>> {
    let ListQuery { city, search } = query(params)?;
    let found = schools::list(state.store(), &caller, SchoolQuery { city, search }).await?;
    Ok(ApiResponse::success(found))
}

/// GET /schools/:id
pub async fn get(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<School> {
    Ok(ApiResponse::success(schools::get(state.store(), &caller, path(id)?).await?))
}

/// POST /schools
pub async fn create(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<SchoolInput>, JsonRejection>,
) -> ApiResult<School> {
    let school = schools::create(state.store(), &caller, body(payload)?).await?;
    Ok(ApiResponse::created(school))
}

/// PUT /schools/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SchoolInput>, JsonRejection>,
) -> ApiResult<School> {
    let school = schools::update(state.store(), &caller, path(id)?, body(payload)?).await?;
    Ok(ApiResponse::success(school))
}

/// DELETE /schools/:id
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    schools::delete(state.store(), &caller, path(id)?).await?;
    Ok(ApiResponse::success(json!({ "message": "School deleted" })))
}

/// PUT /schools/:id/assign - move a school into a district administrator's city
pub async fn assign(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<School> {
    let AssignRequest { district_admin_id } = body(payload)?;
    let school = schools::assign_district(state.store(), &caller, path(id)?, district_admin_id).await?;
    Ok(ApiResponse::success(school))
}

/// GET /cities
pub async fn cities(Extension(state): Extension<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Vec<String>> {
    Ok(ApiResponse::success(schools::cities(state.store(), &caller).await?))
}
