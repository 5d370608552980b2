//! Gateway plumbing shared by the proxied routes.
//!
//! - **rate_limit**: per-client token buckets and their axum middleware
//! - **sanitize**: order and training payload normalization
//! - **upstream**: outbound client for the order/training service

pub mod rate_limit;
pub mod sanitize;
pub mod upstream;

pub use rate_limit::RateLimiter;
pub use sanitize::{sanitize_order, sanitize_training, OrderItem, OrderPayload, TrainingPayload};
pub use upstream::{UpstreamClient, UpstreamResponse};
