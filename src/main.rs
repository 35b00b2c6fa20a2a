//! SkyArena engine host
//!
//! Loads arenas and kits, runs every arena on the tokio scheduler and logs a
//! periodic status line until shutdown.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skyarena::app::AppState;
use skyarena::config::{keys, Config, Settings};
use skyarena::util::time::{init_server_time, uptime_secs};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting SkyArena engine");

    let kits_file = PathBuf::from(config.string_setting(keys::KITS_FILE));
    let state = AppState::new(config)?;

    if kits_file.exists() {
        if let Err(e) = state.kits.load_json(&kits_file) {
            warn!(path = %kits_file.display(), error = %e, "Failed to load kits");
        }
    }

    let loaded = state.directory.load_all()?;
    info!(arenas = loaded, kits = state.kits.len(), "Engine ready");

    let status_state = state.clone();
    let status = tokio::spawn(async move {
        let mut ticker = interval(STATUS_INTERVAL);
        loop {
            ticker.tick().await;
            for arena in status_state.directory.list_arenas() {
                info!(
                    arena = %arena.name,
                    phase = %arena.phase,
                    players = arena.players,
                    spectators = arena.spectators,
                    capacity = arena.capacity,
                    uptime_secs = uptime_secs(),
                    "Arena status"
                );
            }
        }
    });

    shutdown_signal().await;

    status.abort();
    state.directory.stop_all();
    if !state.kits.is_empty() {
        if let Err(e) = state.kits.save_json(&kits_file) {
            error!(path = %kits_file.display(), error = %e, "Failed to save kits");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
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
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
