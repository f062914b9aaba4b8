use tokio::signal;
use tracing::{error, info};

/// # Shutdown Signal
///
/// Resolves on Ctrl+C, or on SIGTERM on UNIX systems. If a handler cannot be
/// installed the error is logged and that source never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, initiating shutdown."),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-UNIX systems, `terminate` never completes.
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
