use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{body, path, query};
use crate::app::AppState;
use crate::database::models::Event;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::events::{self, EventChanges, NewEvent, Toggled};
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    pub is_active: Option<bool>,
}

/// GET /events?school_id=
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Event>> {
    let ListQuery { school_id } = query(params)?;
    Ok(ApiResponse::success(events::list(state.store(), &caller, school_id, false).await?))
}

/// GET /events/active?school_id=
pub async fn active(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Event>> {
    let ListQuery { school_id } = query(params)?;
    Ok(ApiResponse::success(events::list(state.store(), &caller, school_id, true).await?))
}

/// GET /events/:id
pub async fn get(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Event> {
    Ok(ApiResponse::success(events::get(state.store(), &caller, path(id)?).await?))
}

/// GET /events/teacher/:id
pub async fn by_teacher(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<Event>> {
    Ok(ApiResponse::success(events::by_teacher(state.store(), &caller, path(id)?).await?))
}

/// POST /events
pub async fn create(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> ApiResult<Event> {
    let event = events::create(state.store(), &caller, body(payload)?).await?;
    Ok(ApiResponse::created(event))
}

/// PUT /events/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EventChanges>, JsonRejection>,
) -> ApiResult<Event> {
    let event = events::update(state.store(), &caller, path(id)?, body(payload)?).await?;
    Ok(ApiResponse::success(event))
}

/// PUT /events/:id/toggle-active - an empty body flips the flag
pub async fn toggle_active(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
    raw: Bytes,
) -> ApiResult<Toggled> {
    let request: ToggleRequest = if raw.iter().all(u8::is_ascii_whitespace) {
        ToggleRequest::default()
    } else {
        serde_json::from_slice(&raw).map_err(|e| ApiError::InvalidJson(e.to_string()))?
    };
    let toggled = events::set_active(state.store(), &caller, path(id)?, request.is_active).await?;
    Ok(ApiResponse::success(toggled))
}

/// DELETE /events/:id - also removes the event's live marks
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let removed = events::delete(state.store(), &caller, path(id)?).await?;
    Ok(ApiResponse::success(json!({ "message": "Event deleted", "attendance_removed": removed })))
}
