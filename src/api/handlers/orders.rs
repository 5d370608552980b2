use super::{authorization, JsonBody};
use crate::{
    gateway::{sanitize_order, OrderPayload, UpstreamResponse},
    types::{ErrorBody, Result},
    AppState,
};
use axum::{extract::State, http::HeaderMap};
use serde_json::Value;

/// List orders from the upstream service
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "Upstream order list, relayed verbatim"),
        (status = 401, description = "Missing bearer token", body = ErrorBody),
        (status = 403, description = "Invalid or expired token", body = ErrorBody),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<UpstreamResponse> {
    state.upstream.get("/orders", authorization(&headers)).await
}

/// Submit an order
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderPayload,
    responses(
        (status = 201, description = "Stored order, relayed verbatim"),
        (status = 400, description = "Missing name/email or no valid item", body = ErrorBody),
        (status = 401, description = "Missing bearer token", body = ErrorBody),
        (status = 403, description = "Invalid or expired token", body = ErrorBody),
        (status = 429, description = "Too Many Requests", body = ErrorBody),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<Value>,
) -> Result<UpstreamResponse> {
    let order = sanitize_order(&body)?;

    tracing::info!(items = order.items.len(), "forwarding order");
    state
        .upstream
        .post("/orders", &order, authorization(&headers))
        .await
}
