//! Authentication
//!
//! - [`auth::password`](crate::auth::password) - salted PBKDF2-SHA512 credential hashing
//! - [`auth::jwt`](crate::auth::jwt) - HS256 access and refresh token codec
//! - [`auth::service`](crate::auth::service) - registration, login, profile update, verification
//! - [`auth::middleware`](crate::auth::middleware) - bearer extraction for protected routes
//!
//! Tokens are self-contained and stateless: nothing is stored server-side, and
//! a token stays valid until its `exp` claim passes.

/// Signed session token encoding and verification.
pub mod jwt;
/// Bearer middleware and the `CurrentUser` extractor.
pub mod middleware;
/// Password hashing and verification.
pub mod password;
/// Identity workflows on top of the user store.
pub mod service;
