//! Shared helpers for integration tests.
#![allow(dead_code)]

use axum_test::TestServer;
use masterfork::{
    api::routes::create_router,
    db::MemoryUserStore,
    utils::toml_config::{GatewayConfig, IdentityBackend},
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

/// Config pointing at `upstream_url` with an in-memory identity store.
pub fn test_config(upstream_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.identity.backend = IdentityBackend::Memory;
    config.upstream.base_url = upstream_url.to_string();
    config.upstream.timeout_secs = Some(5);
    config
}

pub fn create_test_server_with(config: GatewayConfig) -> TestServer {
    let state = AppState::new(config, Arc::new(MemoryUserStore::new()), TEST_SECRET)
        .expect("Failed to build app state");
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

pub fn create_test_server(upstream_url: &str) -> TestServer {
    create_test_server_with(test_config(upstream_url))
}

/// Registers a user and returns the response body.
pub async fn register(server: &TestServer, name: &str, email: &str, password: &str) -> Value {
    let response = server
        .post("/auth/register")
        .json(&json!({"name": name, "email": email, "password": password}))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Registers a user and returns its access token.
pub async fn register_token(server: &TestServer, email: &str) -> String {
    let body = register(server, "Test User", email, "secret1").await;
    body["token"]
        .as_str()
        .expect("token should be a string")
        .to_string()
}
