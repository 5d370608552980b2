//! HTTP surface of the gateway, built on axum.
//!
//! # Endpoints
//!
//! ## Authentication
//! - `POST /auth/register` - create an account, returns tokens
//! - `POST /auth/login` - exchange credentials for tokens
//! - `POST /auth/refresh` - exchange a refresh token for an access token
//! - `PUT /auth/profile` - update name/email (bearer)
//! - `GET /auth/me` - current user (bearer)
//!
//! ## Proxied
//! - `GET/POST /orders` - bearer required, POST rate limited
//! - `GET/POST /training` - POST rate limited
//! - `GET /admin/orders`, `GET /admin/training`
//!
//! ## Misc
//! - `GET /health`
//! - `GET /api-docs/openapi.json`
//!
//! Every error body has the shape `{ "error": string, "details"?: object }`.

/// Request handlers for all endpoints.
pub mod handlers;
/// Router assembly and the OpenAPI document.
pub mod routes;
