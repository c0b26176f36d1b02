use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use resource_viewer::config::{Command, Config, StorageBackend};
use resource_viewer::logging;
use resource_viewer::storage::{MemoryStorage, SqliteStorage, Storage};
use resource_viewer::web::{Assets, Server, ShutdownOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args();

    if let Some(Command::Version) = &config.command {
        println!(
            "resource-viewer {}, commit: {}, build_date: {}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_SHA"),
            env!("VERGEN_BUILD_TIMESTAMP"),
        );
        return Ok(());
    }

    logging::init(config.log_format, &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("VERGEN_GIT_SHA"),
        build_date = env!("VERGEN_BUILD_TIMESTAMP"),
        storage_backend = %config.storage_backend,
        port = config.server_port,
        "resource-viewer starting"
    );

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        std::process::exit(1);
    }

    let storage: Arc<dyn Storage> = match config.storage_backend {
        StorageBackend::Sqlite => {
            let sqlite = SqliteStorage::open(&config.get_db_path())?;
            info!(path = %sqlite.path(), "Using SQLite storage");
            Arc::new(sqlite)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, queries will return empty results");
            Arc::new(MemoryStorage::new())
        }
    };

    let settings = config
        .server_settings()
        .context("Invalid server settings")?;
    let server = Server::new(settings, storage, Assets::embedded());
    let handle = server.serve().await.context("Failed to start server")?;

    shutdown_signal().await;
    info!("Received shutdown signal");

    match handle.stop().await {
        ShutdownOutcome::Failed(reason) => {
            error!(reason = %reason, "Server did not shut down cleanly");
            std::process::exit(1);
        }
        outcome => info!(outcome = ?outcome, "Shutdown complete"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
