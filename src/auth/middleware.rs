use crate::auth::service::AuthService;
use crate::types::{AppError, PublicUser};
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Returns the credential of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Requires a valid access token and stores the resolved user in the request extensions.
///
/// A missing or non-Bearer header yields 401. An invalid or expired token, or a
/// token whose user no longer exists, yields 403.
pub async fn require_auth(auth_service: Arc<AuthService>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return AppError::MissingToken.into_response();
    };

    let user = match auth_service.verify(token).await {
        Ok(user) => user,
        Err(AppError::InvalidToken) | Err(AppError::NotFound(_)) => {
            tracing::debug!(path = %req.uri().path(), "rejected bearer token");
            return AppError::InvalidToken.into_response();
        }
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(CurrentUser(user));

    next.run(req).await
}

/// The authenticated user placed in the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::MissingToken)
    }
}
