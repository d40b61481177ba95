//! Main entry point for the mm-rules matchmaking service

use anyhow::{Context, Result};
use clap::Parser;
use mm_rules::api::{self, ApiState};
use mm_rules::config::AppConfig;
use mm_rules::service::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// MM-Rules Matchmaking Service - rules-driven multi-team matchmaking
#[derive(Parser)]
#[command(
    name = "mm-rules",
    version,
    about = "Rules-driven multi-team matchmaking service",
    long_about = "Accepts player join requests tagged with arbitrary metadata, groups them \
                 into multi-team matches that satisfy per-game compatibility rules, and hands \
                 formed matches to an external session allocator."
)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override HTTP server port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Validate configuration and exit without starting the service
    #[arg(long)]
    dry_run: bool,

    /// Probe the configured store and exit with a status code
    #[arg(long)]
    health_check: bool,
}

/// Initialize structured logging with the configured level. Release mode
/// drops ANSI colour for log collectors.
fn init_logging(log_level: &str, release: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_ansi(!release)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(path) = &args.config {
        AppConfig::from_file(path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.log.level = log_level.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    Ok(config)
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT");
        },
        _ = terminate => {
            info!("received SIGTERM");
        },
    }
}

/// Probe the configured store and exit accordingly
async fn perform_health_check(config: AppConfig) -> Result<()> {
    let app_state = AppState::new(config).await?;
    match app_state.matchmaking().ping_storage().await {
        Ok(()) => {
            println!("Health check: healthy");
            std::process::exit(0);
        }
        Err(e) => {
            error!("health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("{:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.log.level, config.is_release()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("configuration validation successful");
        return Ok(());
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    info!(
        version = mm_rules::VERSION,
        port = config.server.port,
        mode = %config.server.mode,
        "starting mm-rules matchmaking server"
    );

    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };
    app_state.start().await?;

    let router = api::router(ApiState {
        matchmaking: app_state.matchmaking(),
        metrics: app_state.metrics(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    app_state.shutdown().await;
    info!("server exited");

    Ok(())
}
