use anyhow::Context;
use masterfork::{
    api::routes::create_router,
    cli::{output::Output, run_config_command, Cli, Commands},
    db::UserStoreProvider,
    gateway::rate_limit,
    utils::toml_config::{GatewayConfig, LogFormat},
    AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = Output::from_flag(cli.no_color);

    let config = GatewayConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command() {
        Commands::Config { validate } => {
            run_config_command(&output, &config, &cli.config, validate)?;
            Ok(())
        }
        Commands::Serve => {
            init_tracing(&config, cli.verbose);
            if !cli.config.exists() {
                warn!(path = %cli.config.display(), "configuration file not found, using defaults");
            }
            output.banner();
            serve(config).await
        }
    }
}

fn init_tracing(config: &GatewayConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    let secret = config.jwt_secret()?;

    let store = UserStoreProvider::from_config(&config.identity)
        .create_store()
        .await
        .context("Failed to open identity store")?;

    let addr = config.bind_address();
    let sweep_every = Duration::from_secs(config.rate_limit.sweep_interval_secs);
    info!(
        upstream = %config.upstream.base_url,
        backend = ?config.identity.backend,
        "starting gateway"
    );

    let state = AppState::new(config, store, &secret)?;
    let sweeper = rate_limit::spawn_sweeper(state.rate_limiter.clone(), sweep_every);
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
