//! gavinho-mqt - MQT import microservice
//!
//! **Module Identity:**
//! - Name: gavinho-mqt (bill of quantities import)
//! - Default bind: 127.0.0.1:5730
//!
//! Imports spreadsheet rows into construction MQT items, keeps the import
//! history for revert, and stores per-construction validation rules.

use anyhow::{Context, Result};
use clap::Parser;
use gavinho_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use gavinho_common::events::EventBus;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gavinho_mqt::services::SheetsClient;
use gavinho_mqt::{build_router, AppState};

/// Config file name under `<config_dir>/gavinho/`
const MODULE_NAME: &str = "mqt";

#[derive(Debug, Parser)]
#[command(name = "gavinho-mqt", version, about = "GAVINHO MQT import service")]
struct Args {
    /// Root folder holding gavinho.db
    #[arg(long, env = "GAVINHO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP listen address (overrides the config file)
    #[arg(long, env = "GAVINHO_BIND")]
    bind: Option<String>,

    /// Event bus capacity for SSE subscribers
    #[arg(long, default_value_t = 100)]
    event_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder.clone());
    let defaults = CompiledDefaults::for_current_platform();

    // Log level comes from the config file unless RUST_LOG is set; errors in
    // the file are reported once tracing is up
    let log_level = resolver
        .config_file_path()
        .filter(|path| path.exists())
        .and_then(|path| TomlConfig::load(&path).ok())
        .map(|config| config.logging.level)
        .unwrap_or(defaults.log_level.clone());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Build identification first, before any database work
    info!(
        "Starting GAVINHO MQT (gavinho-mqt) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = resolver.load_toml().unwrap_or_default();

    let root_folder = resolver.resolve();
    info!("Root folder: {}", root_folder.display());

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    if !initializer.database_exists() {
        info!("Creating new database");
    }
    info!("Database: {}", db_path.display());

    let db_pool = gavinho_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let event_bus = EventBus::new(args.event_capacity);
    let sheets = SheetsClient::new().context("Failed to build HTTP client")?;

    let state = AppState::new(db_pool, event_bus, sheets);
    let app = build_router(state);

    let bind_address = args
        .bind
        .or(toml_config.bind_address)
        .unwrap_or(defaults.bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("gavinho-mqt listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gavinho-mqt stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
