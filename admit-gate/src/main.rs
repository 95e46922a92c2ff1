//! admit-gate - ticket issuance and gate admission service
//!
//! Subcommands:
//! - `serve` (default): HTTP service for payment webhooks, gate scans, and
//!   ticket administration
//! - `keygen`: print a fresh QR token key
//! - `reconcile`: issue tickets for provider transactions whose webhook was missed

use std::path::PathBuf;

use admit_common::config::{read_config_file, ConfigOverrides, GateConfig};
use admit_common::db::init_database;
use admit_common::QrCodec;
use admit_gate::reconcile::{self, ProviderClient};
use admit_gate::{build_router, AppState};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for admit-gate
#[derive(Parser, Debug)]
#[command(name = "admit-gate")]
#[command(about = "Ticket issuance and gate admission service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "ADMIT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve,
    /// Print a new base64 QR token key
    Keygen,
    /// Issue tickets for successful provider transactions that were never delivered
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if matches!(args.command, Some(Command::Keygen)) {
        println!("{}", QrCodec::generate_key());
        return Ok(());
    }

    let (config_file, toml_config) =
        read_config_file(args.config.as_deref()).context("Failed to read config file")?;

    init_tracing(&toml_config.logging.level);

    info!(
        "Starting admit-gate v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_file {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found, using environment and compiled defaults"),
    }

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        database_path: args.database.clone(),
        bind_addr: args.bind.clone(),
        port: args.port,
    };
    let config = GateConfig::from_env(toml_config, overrides).context("Invalid configuration")?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let state = AppState::from_config(pool, &config).context("Failed to initialize QR codec")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::Reconcile => run_reconcile(state, &config).await,
        Command::Keygen => Ok(()),
    }
}

fn init_tracing(level: &str) {
    let default_filter = format!("admit_gate={0},admit_common={0},tower_http={0}", level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn serve(state: AppState, config: &GateConfig) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("admit-gate listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_reconcile(state: AppState, config: &GateConfig) -> Result<()> {
    let Some(provider) = config.provider.clone() else {
        bail!("provider_secret_key is not set; reconciliation needs provider API access");
    };

    let client = ProviderClient::new(provider)?;
    let report = reconcile::reconcile(&client, &state.issuance, &state.ids).await?;

    info!(
        scanned = report.scanned,
        issued_orders = report.issued_orders,
        tickets_created = report.tickets_created,
        already_processed = report.already_processed,
        not_successful = report.not_successful,
        rejected = report.rejected,
        "Reconciliation complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
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
