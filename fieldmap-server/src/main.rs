//! fieldmap-server - Field service mapping backend
//!
//! Ingests technician and customer rosters, geocodes them into GeoJSON,
//! and answers coverage queries for the map front end.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldmap_common::config::{
    default_config_path, ensure_toml_config, load_toml_config_or_default, CompiledDefaults,
    DataFolderInitializer, DataFolderResolver,
};
use fieldmap_server::config::ServiceSettings;
use fieldmap_server::services::StorageLayout;
use fieldmap_server::AppState;

/// Command-line arguments for fieldmap-server
#[derive(Parser, Debug)]
#[command(name = "fieldmap-server")]
#[command(about = "Field service mapping backend")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "FIELDMAP_PORT")]
    port: u16,

    /// Folder holding rosters, GeoJSON and the legend config
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// TOML config file (default: ~/.config/fieldmap/fieldmap.toml)
    #[arg(short, long, env = "FIELDMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Write a starter config file if none exists yet
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let created_config = match (&config_path, args.init_config) {
        (Some(path), true) => ensure_toml_config(path)
            .with_context(|| format!("Failed to write starter config {}", path.display()))?,
        _ => false,
    };
    let toml_config = load_toml_config_or_default(config_path.as_deref());

    // Initialize tracing; RUST_LOG wins over the TOML level
    let default_filter = format!(
        "fieldmap_server={level},fieldmap_common={level},tower_http={level}",
        level = toml_config.logging.level
    );
    let file_layer = match &toml_config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    info!("Starting fieldmap-server on port {}", args.port);
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if created_config {
        if let Some(path) = &config_path {
            info!("Wrote starter config to {}", path.display());
        }
    } else if args.init_config && config_path.is_none() {
        warn!("--init-config ignored: no config path could be determined");
    }

    // Resolve and create the data folder
    let data_folder = DataFolderResolver::new()
        .with_cli_arg(args.data_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize data folder")?;
    info!("Data folder: {}", initializer.data_folder().display());

    let settings = ServiceSettings::from_toml(&toml_config);
    if settings.tomtom_api_key.is_none() {
        warn!("Geocoding, routing and isochrones are unavailable until a TomTom API key is configured");
    }
    info!("Geocode cool-down: {:?}", settings.geocode_cooldown);

    let layout = StorageLayout::new(initializer.data_folder());
    let state = AppState::with_tomtom(layout, settings).context("Failed to build TomTom clients")?;
    let app = fieldmap_server::build_router(state);

    let bind_address = toml_config
        .bind_address
        .clone()
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().bind_address);
    let addr: SocketAddr = format!("{}:{}", bind_address, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", bind_address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
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
            Ok(mut stream) => {
                stream.recv().await;
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
