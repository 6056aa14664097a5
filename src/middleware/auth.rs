use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::services::Caller;

/// Bearer-token middleware. Puts the token's [`Caller`] into the request
/// extensions; handlers take it with `Extension<Caller>`.
pub async fn require_bearer(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let token = match extract_jwt_from_headers(&headers) {
        Ok(token) => token,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    let claims = match validate_jwt(token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("rejected bearer token: {}", err);
            return ApiError::from(err).into_response();
        }
    };

    request.extensions_mut().insert(Caller::from(claims));
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Access denied: No token provided")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty JWT token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
