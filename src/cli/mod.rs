//! CLI module for the gateway binary
//!
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use crate::utils::toml_config::{ConfigError, GatewayConfig, IdentityBackend, LogFormat};
use clap::{Parser, Subcommand};
use output::Output;
use std::path::PathBuf;

/// Masterfork Gateway - auth and order/training proxy
#[derive(Parser, Debug)]
#[command(
    name = "masterfork-gateway",
    version,
    about = "Masterfork Gateway - authentication and order/training proxy",
    long_about = "Backend-for-frontend for the Masterfork storefront: user registration and\n\
                  login with signed session tokens, plus rate-limited, sanitized forwarding of\n\
                  order and training submissions to the upstream service.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  masterfork-gateway                          # Start the server\n    \
                  masterfork-gateway --config prod.toml       # Use a custom config file\n    \
                  masterfork-gateway config --validate        # Check the effective configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "MASTERFORK_CONFIG",
        default_value = crate::utils::toml_config::DEFAULT_CONFIG_FILE,
        global = true
    )]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Show configuration information
    Config {
        /// Also check the signing secret and limits
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Prints the effective configuration. The signing secret itself is never shown.
pub fn print_config(output: &Output, config: &GatewayConfig, source: &std::path::Path) {
    output.header("Configuration");
    output.kv("source", &source.display().to_string());

    output.subheader("server");
    output.kv("listen", &config.bind_address());
    output.kv("log_level", &config.server.log_level);
    output.kv(
        "log_format",
        match config.server.log_format {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        },
    );
    output.kv("body_limit_bytes", &config.server.body_limit_bytes.to_string());

    output.subheader("auth");
    output.kv("jwt_secret_env", &config.auth.jwt_secret_env);
    let secret_state = match config.jwt_secret() {
        Ok(_) => "set",
        Err(_) => "missing",
    };
    output.kv("secret", secret_state);
    output.kv("access_token_ttl_secs", &config.auth.access_token_ttl_secs.to_string());
    output.kv("refresh_token_ttl_secs", &config.auth.refresh_token_ttl_secs.to_string());

    output.subheader("identity");
    let backend = match config.identity.backend {
        IdentityBackend::Memory => "memory",
        IdentityBackend::File => "file",
        IdentityBackend::Sqlite => "sqlite",
    };
    output.kv("backend", backend);
    if config.identity.backend != IdentityBackend::Memory {
        output.kv("path", &config.identity.path);
    }

    output.subheader("upstream");
    output.kv("base_url", &config.upstream.base_url);
    output.kv(
        "timeout",
        &config
            .upstream
            .timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string()),
    );

    output.subheader("rate_limit");
    output.kv("capacity", &config.rate_limit.capacity.to_string());
    output.kv("window_ms", &config.rate_limit.window_ms.to_string());
    output.kv("max_clients", &config.rate_limit.max_clients.to_string());
}

/// Runs `config [--validate]`.
pub fn run_config_command(
    output: &Output,
    config: &GatewayConfig,
    source: &std::path::Path,
    validate: bool,
) -> Result<(), ConfigError> {
    print_config(output, config, source);

    if !validate {
        return Ok(());
    }

    match config.validate() {
        Ok(()) => {
            output.success("Configuration is valid");
            Ok(())
        }
        Err(e) => {
            output.error(&e.to_string());
            output.hint(&format!(
                "Set {} to a secret of at least {} bytes, e.g. in .env",
                config.auth.jwt_secret_env,
                crate::utils::toml_config::MIN_SECRET_LEN
            ));
            Err(e)
        }
    }
}
