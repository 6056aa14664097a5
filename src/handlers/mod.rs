// handlers/mod.rs - one module per resource
//
// Public: /, /health, /auth/login
// Protected (bearer token): everything else

pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod events;
pub mod schools;
pub mod students;
pub mod system;
pub mod users;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;

use crate::error::ApiError;

/// Unwraps a JSON body, reporting a malformed one in the error envelope.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

pub(crate) fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params.map(|Query(value)| value).map_err(ApiError::from)
}

pub(crate) fn path<T>(segment: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    segment.map(|Path(value)| value).map_err(ApiError::from)
}
