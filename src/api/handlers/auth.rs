use super::JsonBody;
use crate::{
    auth::middleware::CurrentUser,
    types::{
        AppError, AuthResponse, ErrorBody, LoginRequest, MeResponse, ProfileResponse,
        ProfileUpdateRequest, RefreshRequest, RegisterRequest, Result, TokenResponse,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};

/// Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Missing field or weak password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let session = state
        .auth_service
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully.".to_string(),
            user: session.user,
            token: session.token,
            refresh_token: session.refresh_token,
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    // An unknown email is reported like a wrong password
    let session = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::InvalidCredentials("Invalid credentials.".to_string()),
            other => other,
        })?;

    Ok(Json(AuthResponse {
        message: "Login successful.".to_string(),
        user: session.user,
        token: session.token,
        refresh_token: session.refresh_token,
    }))
}

/// Update the authenticated user's name and/or email
#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated, token re-minted", body = ProfileResponse),
        (status = 400, description = "Empty name or email", body = ErrorBody),
        (status = 401, description = "Missing bearer token", body = ErrorBody),
        (status = 403, description = "Invalid or expired token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ProfileUpdateRequest>,
) -> Result<Json<ProfileResponse>> {
    let updated = state.auth_service.update(user.id, payload).await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully.".to_string(),
        user: updated.user,
        token: updated.token,
    }))
}

/// Current user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = MeResponse),
        (status = 401, description = "Missing bearer token", body = ErrorBody),
        (status = 403, description = "Invalid or expired token", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    // The middleware has already re-read the record from the store
    Json(MeResponse { user })
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 400, description = "Missing refresh token", body = ErrorBody),
        (status = 403, description = "Invalid or expired refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let refresh_token = payload.refresh_token.trim();
    if refresh_token.is_empty() {
        return Err(AppError::Validation("Refresh token is required.".to_string()));
    }

    let token = state
        .auth_service
        .refresh(refresh_token)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::InvalidToken,
            other => other,
        })?;

    Ok(Json(TokenResponse { token }))
}
