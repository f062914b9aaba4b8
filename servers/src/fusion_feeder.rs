use anyhow::Result;
use clap::Parser;
use lib_fusion::loggers::{LoggerLocal, LoggerLocalOptions};
use tracing::info;

mod feeder_logic;
use feeder_logic::{config::FeederConfig, upstream};

#[path = "fusion_logic/shutdown.rs"]
mod shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = FeederConfig::parse();
    let _logger = LoggerLocal::init(LoggerLocalOptions {
        app_name: "fusion_feeder".to_string(),
        level: config.log_level.clone(),
        log_dir: None,
    })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        shutdown::shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    let sent = upstream::run(config, shutdown_rx).await;

    info!(sent, "Feeder stopped.");
    Ok(())
}
