use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// ============= Authentication Types =============

/// Body of `POST /auth/register`.
///
/// Every field is optional at the wire level so that missing values surface as
/// validation errors instead of deserialization rejections.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `PUT /auth/profile`. Absent fields keep their current value.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// The externally visible view of a user record. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Outcome of a successful registration or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
    pub refresh_token: String,
}

/// Outcome of a successful profile update: the stored user plus a re-minted token.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicUser,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub message: String,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Shape shared by every error body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication token not provided")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too Many Requests")]
    RateLimited,

    /// The upstream service answered with a structured application error.
    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<Value>,
    },

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status class of this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials(_) | AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { status, .. } => *status,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            AppError::Validation(msg)
            | AppError::InvalidCredentials(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => (msg, None),
            AppError::MissingToken => ("Authentication token not provided".to_string(), None),
            AppError::InvalidToken => ("Invalid or expired token".to_string(), None),
            AppError::PayloadTooLarge => ("Request body too large".to_string(), None),
            AppError::RateLimited => ("Too Many Requests".to_string(), None),
            AppError::Upstream {
                message, details, ..
            } => (message, details),
            AppError::UpstreamUnavailable(reason) => {
                tracing::warn!(%reason, "upstream unavailable");
                ("Upstream service unavailable".to_string(), None)
            }
            AppError::Database(detail) | AppError::Internal(detail) => {
                tracing::error!(%detail, "internal failure");
                ("Internal server error".to_string(), None)
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        match rejection {
            JsonRejection::JsonSyntaxError(_) => {
                AppError::Validation("Malformed JSON body".to_string())
            }
            other => AppError::Validation(other.body_text()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
