//! API request handlers, organized by route group.

use crate::types::AppError;
use axum::extract::FromRequest;

/// Administrative read-only proxies.
pub mod admin;
/// Registration, login, profile and token refresh.
pub mod auth;
/// Liveness and the OpenAPI document.
pub mod health;
/// Order listing and submission proxies.
pub mod orders;
/// Training registration proxies.
pub mod training;

/// JSON body extractor whose rejections use the gateway's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Raw `Authorization` header value, forwarded verbatim to the upstream.
pub(crate) fn authorization(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}
