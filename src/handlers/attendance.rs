use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{body, path, query};
use crate::app::AppState;
use crate::database::models::AttendanceRecord;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ledger::{self, AttendanceEntry, AttendanceQuery, RecordAttendance};
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub student_id: Uuid,
    pub event_name: String,
    #[serde(alias = "school_id")]
    pub school_id: Option<Uuid>,
}

/// GET /attendance?school_id=&city=&period=week|month|year
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<AttendanceQuery>, QueryRejection>,
) -> ApiResult<Vec<AttendanceEntry>> {
    let request = query(params)?;
    Ok(ApiResponse::success(ledger::list(state.store(), &caller, request).await?))
}

/// GET /attendance/event/:name?school_id= - live marks only
pub async fn by_event(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    name: Result<Path<String>, PathRejection>,
    params: Result<Query<EventQuery>, QueryRejection>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let name = path(name)?;
    let EventQuery { school_id } = query(params)?;
    Ok(ApiResponse::success(ledger::by_event(state.store(), &caller, &name, school_id).await?))
}

/// GET /attendance/student/:id - live and historical marks
pub async fn by_student(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<AttendanceEntry>> {
    Ok(ApiResponse::success(ledger::by_student(state.store(), &caller, path(id)?).await?))
}

/// GET /attendance/check?studentId=&eventName=
pub async fn check(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<CheckQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let CheckQuery { student_id, event_name, school_id } = query(params)?;
    let recorded = ledger::check(state.store(), &caller, student_id, &event_name, school_id).await?;
    Ok(ApiResponse::success(json!({ "recorded": recorded })))
}

/// POST /attendance
pub async fn record(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<RecordAttendance>, JsonRejection>,
) -> ApiResult<AttendanceRecord> {
    let mark = ledger::record(state.store(), &caller, body(payload)?).await?;
    Ok(ApiResponse::created(mark))
}

/// DELETE /attendance/:id - live ledger only
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    ledger::delete(state.store(), &caller, path(id)?).await?;
    Ok(ApiResponse::success(json!({ "message": "Attendance record deleted" })))
}

/// DELETE /attendance/event/:name/delete-all?school_id=
pub async fn delete_all(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    name: Result<Path<String>, PathRejection>,
    params: Result<Query<EventQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let name = path(name)?;
    let EventQuery { school_id } = query(params)?;
    let removed = ledger::delete_all_for_event(state.store(), &caller, &name, school_id).await?;
    Ok(ApiResponse::success(json!({ "deleted": removed })))
}
