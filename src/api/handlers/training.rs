use super::JsonBody;
use crate::{
    gateway::{sanitize_training, TrainingPayload, UpstreamResponse},
    types::{ErrorBody, Result},
    AppState,
};
use axum::extract::State;
use serde_json::Value;

/// List training registrations
#[utoipa::path(
    get,
    path = "/training",
    responses(
        (status = 200, description = "Upstream registration list, relayed verbatim"),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    tag = "training"
)]
pub async fn list_training(State(state): State<AppState>) -> Result<UpstreamResponse> {
    state.upstream.get("/training", None).await
}

/// Register interest in a training course
///
/// Accepts Portuguese (`nome`, `formacao`, `telefone`, `mensagem`) or English
/// (`name`, `training`, `phone`, `message`) field names.
#[utoipa::path(
    post,
    path = "/training",
    request_body = TrainingPayload,
    responses(
        (status = 201, description = "Stored registration, relayed verbatim"),
        (status = 400, description = "Missing name, email or training area", body = ErrorBody),
        (status = 429, description = "Too Many Requests", body = ErrorBody),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    tag = "training"
)]
pub async fn create_training(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> Result<UpstreamResponse> {
    let registration = sanitize_training(&body)?;

    state.upstream.post("/training", &registration, None).await
}
