//! # Masterfork Gateway
//!
//! Backend-for-frontend of the Masterfork storefront. It owns user identity
//! (salted PBKDF2 credentials, HS256 session tokens) and fronts the internal
//! order/training service: requests are rate limited per client, authenticated,
//! sanitized, and forwarded, and upstream failures are normalized into stable
//! client-facing errors.
//!
//! ## Library usage
//!
//! ```rust,ignore
//! use masterfork::{api::routes::create_router, AppState, GatewayConfig};
//! use masterfork::db::UserStoreProvider;
//!
//! let config = GatewayConfig::load_or_default("masterfork.toml")?;
//! let store = UserStoreProvider::from_config(&config.identity).create_store().await?;
//! let state = AppState::new(config, store, "a-secret-of-at-least-16-bytes")?;
//! let app = create_router(state);
//! ```
//!
//! ## Modules
//!
//! - [`api`] - REST handlers and routes
//! - [`auth`] - credential hashing, token codec, auth service, bearer middleware
//! - [`db`] - identity store backends
//! - [`gateway`] - rate limiting, payload sanitation, upstream client
//! - [`types`] - shared request/response types and `AppError`

/// HTTP API handlers and routes.
pub mod api;
/// Authentication: hashing, tokens, service and middleware.
pub mod auth;
/// Command-line interface.
pub mod cli;
/// Identity store backends.
pub mod db;
/// Rate limiting, sanitation and upstream forwarding.
pub mod gateway;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use auth::jwt::TokenCodec;
pub use auth::service::AuthService;
pub use db::{UserStore, UserStoreProvider};
pub use gateway::{RateLimiter, UpstreamClient};
pub use types::{AppError, Result};
pub use utils::toml_config::GatewayConfig;

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<GatewayConfig>,
    /// Authentication service
    pub auth_service: Arc<AuthService>,
    /// Client for the order/training service
    pub upstream: Arc<UpstreamClient>,
    /// Token buckets shared by the gated route groups
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires the services described by `config` around `store`.
    pub fn new(config: GatewayConfig, store: Arc<dyn UserStore>, jwt_secret: &str) -> Result<Self> {
        let codec = TokenCodec::new(
            jwt_secret,
            config.auth.access_token_ttl_secs,
            config.auth.refresh_token_ttl_secs,
        );
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);

        Ok(Self {
            config: Arc::new(config),
            auth_service: Arc::new(AuthService::new(store, codec)),
            upstream: Arc::new(upstream),
            rate_limiter: Arc::new(rate_limiter),
        })
    }
}
