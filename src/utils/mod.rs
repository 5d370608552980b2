//! Configuration utilities.

/// TOML-based gateway configuration.
pub mod toml_config;
