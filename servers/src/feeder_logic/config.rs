use clap::Parser;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[clap(about = "Simulated vehicle feeding positions to a fusion gateway", version)]
pub struct FeederConfig {
    #[clap(long, env = "FEEDER_URL", default_value = "ws://127.0.0.1:8080/", help = "Gateway WebSocket URL.")]
    pub url: Url,

    #[clap(long, env = "FEEDER_TRACK", help = "Track to report on. A random UUID when unset.")]
    pub track: Option<String>,

    #[clap(long, env = "FEEDER_INTERVAL_MS", default_value_t = 1000, help = "Milliseconds between two reports.")]
    pub interval_ms: u64,

    #[clap(long, env = "FEEDER_COUNT", help = "Stop after this many reports. Runs until interrupted when unset.")]
    pub count: Option<u64>,

    #[clap(
        long,
        env = "FEEDER_RECONNECT_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base delay in milliseconds for reconnect attempts."
    )]
    pub reconnect_base_delay_ms: u64,

    #[clap(
        long,
        env = "FEEDER_RECONNECT_MAX_DELAY_MS",
        default_value_t = 30_000,
        help = "Maximum delay in milliseconds for reconnect attempts."
    )]
    pub reconnect_max_delay_ms: u64,

    #[clap(long, env = "FEEDER_LOG_LEVEL", default_value = "info", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: String,
}

impl FeederConfig {
    /// The configured track, or a fresh UUID. Call once per process so every
    /// reconnect keeps appending to the same track.
    pub fn resolve_track(&self) -> String {
        match self.track.as_deref() {
            Some(track) if !track.is_empty() => track.to_owned(),
            _ => Uuid::new_v4().to_string(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms.max(self.reconnect_base_delay_ms))
    }
}
