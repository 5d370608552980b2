//! Read-only proxies kept for back-office tooling. Access control is left to the upstream.

use super::authorization;
use crate::{
    gateway::UpstreamResponse,
    types::{ErrorBody, Result},
    AppState,
};
use axum::{extract::State, http::HeaderMap};

#[utoipa::path(
    get,
    path = "/admin/orders",
    responses(
        (status = 200, description = "Upstream admin order list, relayed verbatim"),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn admin_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<UpstreamResponse> {
    state
        .upstream
        .get("/admin/orders", authorization(&headers))
        .await
}

#[utoipa::path(
    get,
    path = "/admin/training",
    responses(
        (status = 200, description = "Upstream admin registration list, relayed verbatim"),
        (status = 502, description = "Upstream service unavailable", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn admin_training(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<UpstreamResponse> {
    state
        .upstream
        .get("/admin/training", authorization(&headers))
        .await
}
