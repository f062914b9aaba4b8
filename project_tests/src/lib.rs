//! # Gateway Test Harness
//!
//! Starts the fusion router on an ephemeral local port together with its
//! coordinator, and offers the small helpers the end-to-end tests share.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lib_fusion::engine::{FusionCoordinator, FusionSnapshot};
use lib_fusion::server::{router, SharedGuard, TokenGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type SourceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Token the harness configures on its guard.
pub const TEST_TOKEN: &str = "test-token";

pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    coordinator: JoinHandle<FusionSnapshot>,
    server: JoinHandle<()>,
}

impl TestGateway {
    /// Binds `127.0.0.1:0` and serves the gateway with a `TokenGuard`
    /// accepting [`TEST_TOKEN`].
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let (shutdown, _) = broadcast::channel(1);
        let (coordinator, fusion) = FusionCoordinator::new();
        let coordinator = tokio::spawn(coordinator.run(shutdown.subscribe()));

        let guard: SharedGuard = Arc::new(TokenGuard::new(Some(TEST_TOKEN.to_string())));
        let app = router(fusion, guard);
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve gateway");
        });

        Self {
            addr,
            shutdown,
            coordinator,
            server,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect_source(&self) -> SourceSocket {
        let (socket, _) = connect_async(self.ws_url()).await.expect("connect source");
        socket
    }

    /// Fetches `/debug` with the test token and returns the body.
    pub async fn debug_text(&self) -> String {
        reqwest::Client::new()
            .get(self.http_url("/debug"))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .expect("GET /debug")
            .text()
            .await
            .expect("debug body")
    }

    /// Fetches `/export` with the test token and parses the document.
    pub async fn export(&self) -> serde_json::Value {
        reqwest::Client::new()
            .get(self.http_url("/export"))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .expect("GET /export")
            .json()
            .await
            .expect("export body")
    }

    /// Stops the coordinator and returns its final summary.
    pub async fn stop(self) -> FusionSnapshot {
        let _ = self.shutdown.send(());
        let summary = self.coordinator.await.expect("coordinator task");
        self.server.abort();
        summary
    }
}

/// Counts read back from a `/debug` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugCounts {
    pub tracks: usize,
    pub positions: usize,
    pub clients: usize,
}

pub fn parse_debug(text: &str) -> Option<DebugCounts> {
    let number = |suffix: &str| {
        text.lines()
            .find_map(|line| line.strip_suffix(suffix))
            .and_then(|n| n.trim().parse().ok())
    };
    Some(DebugCounts {
        tracks: number(" tracks")?,
        positions: number(" positions")?,
        clients: number(" clients:")?,
    })
}

/// Number of records exported for `track`, zero when the track is absent.
pub fn track_len(export: &serde_json::Value, track: &str) -> usize {
    export
        .get(track)
        .and_then(|records| records.as_array())
        .map_or(0, Vec::len)
}

/// Polls `check` until it holds or `timeout` elapses. The coordinator applies
/// events asynchronously, so observable state lags behind sends.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
