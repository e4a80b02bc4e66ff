//! # Tuzo API Server
//!
//! ## Usage
//! ```bash
//! # Defaults, or ~/.config/tuzo/tuzo.toml if present
//! cargo run -p tuzo-api
//!
//! # Explicit config file
//! cargo run -p tuzo-api -- --config ./tuzo.toml
//!
//! # Verbose logging
//! RUST_LOG=debug cargo run -p tuzo-api
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tuzo_api::{router, AppState, TuzoConfig};
use tuzo_db::{Database, LoyaltyLedger};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,tuzo_db=debug,tuzo_api=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Tuzo API server...");

    let config = TuzoConfig::load(config_path_from_args())?;
    info!(
        addr = %config.bind_address(),
        db = %config.database.path.display(),
        display_currency = %config.rules.display_currency,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    let ledger = LoyaltyLedger::new(db.clone(), config.rules.clone(), config.retry)?;
    let app = router(AppState::new(db.clone(), ledger));

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Initializes tracing with an `EnvFilter` overridable via `RUST_LOG`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Reads `--config <path>` / `-c <path>` from the command line.
fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
