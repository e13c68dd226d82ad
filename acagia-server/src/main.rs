//! acagia-server: academy management JSON service
//!
//! Resolves configuration (CLI > env > TOML > default), opens or creates the
//! database in the root folder and serves the API until Ctrl+C or SIGTERM.

use acagia_common::config::ConfigResolver;
use acagia_common::db::init_database;
use acagia_server::{build_router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "acagia-server")]
#[command(about = "Academy management service: members, attendance, ranks and promotion")]
#[command(version)]
struct Args {
    /// HTTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind the HTTP server to
    #[arg(short, long)]
    bind: Option<String>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file instead of the platform search path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "acagia_server=info,acagia_common=info,tower_http=info",
                )
            }),
        )
        .init();

    // Build identification goes out before any database work
    info!(
        "Starting Acagia server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = ConfigResolver::new()
        .root_folder(args.root_folder)
        .port(args.port)
        .bind(args.bind)
        .config_file(args.config)
        .resolve();

    config
        .ensure_root_folder()
        .with_context(|| format!("Failed to create root folder {}", config.root_folder.display()))?;
    info!("Root folder: {}", config.root_folder.display());

    let db_path = config.database_path();
    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e).context("Database initialization failed");
        }
    };

    let app = build_router(AppState::new(pool));

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("acagia-server listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
