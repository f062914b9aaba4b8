//! # Gateway Routes
//!
//! | Route          | Guarded | Purpose                                         |
//! |----------------|---------|-------------------------------------------------|
//! | `GET /`        | no      | WebSocket ingress for position sources          |
//! | `GET /health`  | no      | Liveness probe                                  |
//! | `GET /debug`   | yes     | Plain-text summary of coordinator state         |
//! | `GET /export`  | yes     | Every track history as a JSON document          |
//!
//! All handlers share a `FusionHandle` as router state. None of them read the
//! fused state directly; they ask the coordinator for a copy.

use std::fmt::{self, Write as _};

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, error, warn};

use super::auth::{require_auth, SharedGuard};
use super::error::AppError;
use crate::engine::{ClientHandle, ConnectionHandler, FusionHandle, FusionSnapshot, InboundFrame};

/// Builds the gateway router.
///
/// `guard` is consulted for `/debug` and `/export` only.
pub fn router(fusion: FusionHandle, guard: SharedGuard) -> Router {
    let inspection = Router::new()
        .route("/debug", get(debug_handler))
        .route("/export", get(export_handler))
        .route_layer(middleware::from_fn_with_state(guard, require_auth));

    Router::new()
        .route("/", get(ingress_handler))
        .route("/health", get(health_handler))
        .merge(inspection)
        .with_state(fusion)
}

async fn health_handler() -> &'static str {
    "OK"
}

/// # Ingress Handler
///
/// Negotiates the WebSocket upgrade. A failed negotiation is answered with
/// `500` and the rejection text, and nothing is registered. On success the
/// `101` response goes out immediately; registration and the read loop run on
/// the upgraded connection's own task.
async fn ingress_handler(
    State(fusion): State<FusionHandle>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let upgrade = upgrade.map_err(|rejection| AppError::Upgrade(rejection.body_text()))?;
    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    Ok(upgrade
        .on_failed_upgrade(|error| warn!(%error, "WebSocket upgrade failed after handshake."))
        .on_upgrade(move |socket| serve_socket(socket, agent, fusion)))
}

async fn serve_socket(socket: WebSocket, agent: Option<String>, fusion: FusionHandle) {
    let frames = socket.map(|message| message.map(inbound_frame));
    ConnectionHandler::new(ClientHandle::new(agent), fusion)
        .run(frames)
        .await;
}

fn inbound_frame(message: Message) -> InboundFrame {
    match message {
        Message::Text(text) => InboundFrame::Data(Bytes::copy_from_slice(text.as_str().as_bytes())),
        Message::Binary(payload) => InboundFrame::Data(payload),
        Message::Close(_) => InboundFrame::Close,
        Message::Ping(_) | Message::Pong(_) => InboundFrame::Control,
    }
}

/// # Debug Handler
///
/// Plain-text summary: header, track count, position count, then the client
/// count followed by one line per client.
async fn debug_handler(State(fusion): State<FusionHandle>) -> Result<Response, AppError> {
    let snapshot = fusion.snapshot().await?;

    let mut body = String::new();
    if let Err(e) = render_summary(&mut body, &snapshot) {
        error!(error = %e, "Unable to write debug summary.");
    }

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

/// Writes the summary line by line, stopping at the first failed write.
pub fn render_summary<W: fmt::Write>(out: &mut W, snapshot: &FusionSnapshot) -> fmt::Result {
    out.write_str("fusion debug\n\n")?;
    writeln!(out, "{} tracks", snapshot.track_count)?;
    writeln!(out, "{} positions", snapshot.record_count)?;
    writeln!(out)?;
    writeln!(out, "{} clients:", snapshot.client_count())?;
    for client in &snapshot.clients {
        writeln!(out, "{client}")?;
    }
    Ok(())
}

async fn export_handler(State(fusion): State<FusionHandle>) -> Result<Response, AppError> {
    let tracks = fusion.export().await?;
    let body = serde_json::to_vec(&tracks)?;
    debug!(tracks = tracks.len(), bytes = body.len(), "Export encoded.");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailAfter {
        written: String,
        limit: usize,
    }

    impl fmt::Write for FailAfter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.written.len() + s.len() > self.limit {
                return Err(fmt::Error);
            }
            self.written.push_str(s);
            Ok(())
        }
    }

    fn snapshot() -> FusionSnapshot {
        FusionSnapshot {
            track_count: 2,
            record_count: 7,
            clients: vec![ClientHandle::new(Some("feeder".into())), ClientHandle::new(None)],
        }
    }

    #[test]
    fn summary_layout() {
        let snapshot = snapshot();
        let mut out = String::new();
        render_summary(&mut out, &snapshot).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "fusion debug");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "2 tracks");
        assert_eq!(lines[3], "7 positions");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "2 clients:");
        assert_eq!(lines[6], snapshot.clients[0].to_string());
        assert_eq!(lines[7], snapshot.clients[1].to_string());
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn summary_stops_at_first_failed_write() {
        let mut out = FailAfter {
            written: String::new(),
            limit: 30,
        };

        assert!(render_summary(&mut out, &snapshot()).is_err());
        assert!(out.written.starts_with("fusion debug\n\n2 tracks\n"));
        assert!(!out.written.contains("clients"));
    }

    #[test]
    fn maps_websocket_messages() {
        assert_eq!(
            inbound_frame(Message::Text(String::from("{}").into())),
            InboundFrame::Data(Bytes::from_static(b"{}"))
        );
        assert_eq!(
            inbound_frame(Message::Binary(Bytes::from_static(b"[]"))),
            InboundFrame::Data(Bytes::from_static(b"[]"))
        );
        assert_eq!(inbound_frame(Message::Ping(Bytes::new())), InboundFrame::Control);
        assert_eq!(inbound_frame(Message::Close(None)), InboundFrame::Close);
    }
}
