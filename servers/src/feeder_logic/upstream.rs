use crate::feeder_logic::config::FeederConfig;
use crate::feeder_logic::path::CircularPath;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type GatewayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, PartialEq)]
enum SessionEnd {
    Shutdown,
    Finished,
    Lost(String),
}

/// Delay before reconnect attempt `attempt` (1-based): the base delay doubled
/// per failed attempt, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

/// # Feeder Loop
///
/// Connects to the gateway and sends one report per interval until the
/// configured count is reached or shutdown is signalled. A lost connection is
/// retried with exponential backoff; the path and track carry over, so the
/// gateway sees one uninterrupted track across reconnects.
///
/// Returns the number of reports sent.
pub async fn run(config: FeederConfig, mut shutdown: broadcast::Receiver<()>) -> u64 {
    let track = config.resolve_track();
    info!(%track, url = %config.url, "Feeding positions.");

    let mut path = CircularPath::new(track, config.interval());
    let mut attempt: u32 = 0;

    loop {
        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %config.url, "Connected to gateway.");
                attempt = 0;
                match session(ws_stream, &config, &mut path, &mut shutdown).await {
                    SessionEnd::Shutdown => {
                        info!("Feeder shutting down...");
                        return path.produced();
                    }
                    SessionEnd::Finished => {
                        info!(sent = path.produced(), "All reports sent.");
                        return path.produced();
                    }
                    SessionEnd::Lost(reason) => warn!(%reason, "Connection to gateway lost."),
                }
            }
            Err(e) => error!(error = %e, "Failed to connect to gateway."),
        }

        attempt = attempt.saturating_add(1);
        let delay = backoff_delay(attempt, config.reconnect_base_delay(), config.reconnect_max_delay());
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting after delay.");
        tokio::select! {
            _ = shutdown.recv() => return path.produced(),
            _ = sleep(delay) => {}
        }
    }
}

async fn session(
    ws_stream: GatewayStream,
    config: &FeederConfig,
    path: &mut CircularPath,
    shutdown: &mut broadcast::Receiver<()>,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();
    let mut ticker = interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = write.close().await;
                return SessionEnd::Shutdown;
            }
            _ = ticker.tick() => {
                if config.count.is_some_and(|limit| path.produced() >= limit) {
                    let _ = write.close().await;
                    return SessionEnd::Finished;
                }
                let report = path.next_report();
                let payload = match serde_json::to_string(&report) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(error = %e, "Failed to encode report.");
                        continue;
                    }
                };
                debug!(%payload, "Sending report.");
                if let Err(e) = write.send(WsMessage::Text(payload.into())).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
            msg = read.next() => {
                match msg {
                    None => return SessionEnd::Lost("stream ended".to_string()),
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                        return SessionEnd::Lost(format!("closed by gateway {reason}").trim_end().to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                }
            }
        }
    }
}
