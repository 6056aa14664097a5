use axum::Extension;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::analytics::{self, Analytics};
use crate::services::Caller;

/// GET /analytics - totals within the caller's scope
pub async fn summary(Extension(state): Extension<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Analytics> {
    Ok(ApiResponse::success(analytics::summary(state.store(), &caller).await?))
}
