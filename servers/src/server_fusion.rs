use std::sync::Arc;

use anyhow::{Context, Result};
use lib_fusion::engine::FusionCoordinator;
use lib_fusion::loggers::{LoggerLocal, LoggerLocalOptions};
use lib_fusion::server::{router, SharedGuard, TokenGuard};
use tokio::net::TcpListener;
use tracing::{info, warn};

mod fusion_logic;
use fusion_logic::{config, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config()?;
    let logger = LoggerLocal::init(LoggerLocalOptions {
        app_name: "server_fusion".to_string(),
        level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
    })?;
    if let Some(file) = logger.current_log_file() {
        info!(file = %file.display(), "Logging to file.");
    }

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let (coordinator, fusion) = FusionCoordinator::new();
    let coordinator_handle = tokio::spawn(coordinator.run(shutdown_tx.subscribe()));

    let guard = TokenGuard::new(settings.debug_token.clone());
    if !guard.is_open() {
        warn!("No debug token configured; /debug and /export will refuse every request.");
    }
    let guard: SharedGuard = Arc::new(guard);

    let listener = TcpListener::bind(settings.addr)
        .await
        .with_context(|| format!("unable to bind {}", settings.addr))?;
    info!(addr = %settings.addr, "Fusion gateway listening.");

    axum::serve(listener, router(fusion, guard))
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    // The listener has drained; stop the coordinator and collect its final state.
    let _ = shutdown_tx.send(());
    let summary = coordinator_handle.await?;

    info!(
        tracks = summary.track_count,
        positions = summary.record_count,
        clients = summary.client_count(),
        "Shutdown complete."
    );
    Ok(())
}
