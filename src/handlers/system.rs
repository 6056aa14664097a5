use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service descriptor
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "School Attendance API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "public": "/, /health, /auth/login",
                "auth": "/auth/register, /auth/me",
                "schools": "/schools[/:id[/assign]], /cities",
                "users": "/users[/:id[/add-child|/remove-child]], /my-children, /my-student",
                "students": "/students[/:id], /students/qr/:code",
                "events": "/events[/:id[/toggle-active]], /events/active, /events/teacher/:id",
                "attendance": "/attendance[/:id], /attendance/check, /attendance/event/:name[/delete-all], /attendance/student/:id",
                "analytics": "/analytics",
            }
        }
    }))
}

/// GET /health - store ping
pub async fn health(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store().backend();

    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": backend
                }
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": backend
                    }
                })),
            )
        }
    }
}
