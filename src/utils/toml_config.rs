//! TOML-based configuration for the gateway
//!
//! Infrastructure settings (listener, token lifetimes, identity backend,
//! upstream location and rate limits) are read from `masterfork.toml`.
//! Every section has serde defaults, so a missing file or a partial file is
//! still a runnable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "masterfork.toml";

/// Minimum accepted length of the HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Root configuration structure loaded from masterfork.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

// ============= Server Configuration =============

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Largest accepted request body
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the token signing secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_access_ttl() -> i64 {
    3600
}

fn default_refresh_ttl() -> i64 {
    604800
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
        }
    }
}

// ============= Identity Store Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    /// Process-local, lost on restart
    Memory,
    /// In-memory collection mirrored to a JSON file
    #[default]
    File,
    /// Local SQLite database
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub backend: IdentityBackend,

    /// Backing file for the `file` and `sqlite` backends
    #[serde(default = "default_identity_path")]
    pub path: String,
}

fn default_identity_path() -> String {
    "./data/users.json".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: IdentityBackend::default(),
            path: default_identity_path(),
        }
    }
}

// ============= Upstream Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Per-request timeout; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_upstream_url() -> String {
    "http://localhost:3002".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            timeout_secs: None,
        }
    }
}

// ============= Rate Limit Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket size, and the number of tokens refilled per window
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Upper bound on tracked clients
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_capacity() -> u32 {
    60
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_clients() -> usize {
    10_000
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window_ms: default_window_ms(),
            max_clients: default_max_clients(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)?;

        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    ///
    /// Environment overrides are applied on top of either source.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut config = match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound(_)) => Self::default(),
            Err(e) => return Err(e),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `HOST`, `PORT` and `SERVER_BASE_URL` from the environment.
    ///
    /// Blank values and an unparsable `PORT` are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(url) = lookup("SERVER_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.upstream.base_url = url;
        }
    }

    /// Validate the configuration and the availability of the signing secret
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.jwt_secret()?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "Secret in '{}' must be at least {} bytes",
                self.auth.jwt_secret_env, MIN_SECRET_LEN
            )));
        }

        if self.auth.access_token_ttl_secs <= 0 || self.auth.refresh_token_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.capacity must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.window_ms must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.max_clients == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_clients must be greater than zero".to_string(),
            ));
        }

        let base_url = self.upstream.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "upstream.base_url must not be empty".to_string(),
            ));
        }
        match reqwest::Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "upstream.base_url is not a valid http(s) URL: {}",
                    base_url
                )));
            }
        }

        if self.identity.backend != IdentityBackend::Memory && self.identity.path.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "identity.path is required for the file and sqlite backends".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the token signing secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        std::env::var(&self.auth.jwt_secret_env)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    /// `host:port` the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Each test that reads the environment uses its own variable name
    fn config_with_secret_env(name: &str) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret_env = name.to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.body_limit_bytes, 1024 * 1024);
        assert_eq!(config.server.log_format, LogFormat::Pretty);
        assert_eq!(config.auth.jwt_secret_env, "JWT_SECRET");
        assert_eq!(config.auth.access_token_ttl_secs, 3600);
        assert_eq!(config.identity.backend, IdentityBackend::File);
        assert_eq!(config.upstream.base_url, "http://localhost:3002");
        assert_eq!(config.upstream.timeout_secs, None);
        assert_eq!(config.rate_limit.capacity, 60);
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn test_parse_partial_file() {
        let content = r#"
[server]
port = 8080
log_format = "json"

[identity]
backend = "sqlite"
path = "./data/users.db"

[rate_limit]
capacity = 5
"#;

        let config: GatewayConfig = toml::from_str(content).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.identity.backend, IdentityBackend::Sqlite);
        assert_eq!(config.identity.path, "./data/users.db");
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\nbase_url = \"http://orders.internal:9000\"\ntimeout_secs = 5").unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();

        assert_eq!(config.upstream.base_url, "http://orders.internal:9000");
        assert_eq!(config.upstream.timeout_secs, Some(5));
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let missing = GatewayConfig::load("/nonexistent/masterfork.toml");
        assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let invalid = GatewayConfig::load(file.path());
        assert!(matches!(invalid, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HOST", "0.0.0.0"),
            ("PORT", "4000"),
            ("SERVER_BASE_URL", "http://backend:3002"),
        ]
        .into_iter()
        .collect();
        let mut config = GatewayConfig::default();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.upstream.base_url, "http://backend:3002");
        assert_eq!(config.bind_address(), "0.0.0.0:4000");
    }

    #[test]
    fn test_unparsable_port_is_ignored() {
        let mut config = GatewayConfig::default();

        config.apply_overrides(|name| (name == "PORT").then(|| "not-a-port".to_string()));

        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn test_validate_secret() {
        let config = config_with_secret_env("MASTERFORK_TEST_SECRET_UNSET");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));

        std::env::set_var("MASTERFORK_TEST_SECRET_SHORT", "too-short");
        let config = config_with_secret_env("MASTERFORK_TEST_SECRET_SHORT");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        std::env::set_var("MASTERFORK_TEST_SECRET_OK", "a-secret-long-enough-to-sign");
        let config = config_with_secret_env("MASTERFORK_TEST_SECRET_OK");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_limits_and_upstream() {
        std::env::set_var("MASTERFORK_TEST_SECRET_LIMITS", "a-secret-long-enough-to-sign");

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.rate_limit.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.rate_limit.window_ms = 0;
        assert!(config.validate().is_err());

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.upstream.base_url = "ftp://orders".to_string();
        assert!(config.validate().is_err());

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.identity.backend = IdentityBackend::Sqlite;
        config.identity.path = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = config_with_secret_env("MASTERFORK_TEST_SECRET_LIMITS");
        config.identity.backend = IdentityBackend::Memory;
        config.identity.path = String::new();
        assert!(config.validate().is_ok());
    }
}
