//! # Connection Handler
//!
//! Drives the read side of one source connection from accept to teardown:
//!
//! ```text
//! Connected --register--> Streaming --(close | transport error | end)--> Terminated
//!                                                                         |
//!                                                               exactly one unregister
//! ```
//!
//! The handler is transport-agnostic. It consumes any stream of
//! `InboundFrame`s, which the HTTP layer builds from WebSocket messages and
//! tests build from plain iterators.

use std::fmt;
use std::pin::pin;

use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::coordinator::FusionHandle;
use super::position::PositionReport;
use super::registry::{ClientHandle, ClientId};

/// One unit read from a source connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A complete message carrying a JSON position report.
    Data(Bytes),
    /// The peer asked to close the connection.
    Close,
    /// Keep-alive and other control traffic with nothing to decode.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Streaming,
    Terminated,
}

/// Why a connection's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The peer sent a close frame.
    Closed,
    /// The stream ended without a close frame.
    Ended,
    /// Reading from the transport failed.
    Transport(String),
    /// The coordinator stopped accepting events.
    CoordinatorClosed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Closed => f.write_str("closed by peer"),
            Termination::Ended => f.write_str("stream ended"),
            Termination::Transport(error) => write!(f, "transport error: {error}"),
            Termination::CoordinatorClosed => f.write_str("coordinator stopped"),
        }
    }
}

/// Counters for one finished connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub client_id: ClientId,
    pub submitted: usize,
    pub rejected: usize,
    pub termination: Termination,
}

/// # Connection Handler
///
/// Owns one `ClientHandle` for the lifetime of its connection and reports to
/// the coordinator through a `FusionHandle`.
pub struct ConnectionHandler {
    handle: ClientHandle,
    fusion: FusionHandle,
    state: ConnectionState,
}

impl ConnectionHandler {
    pub fn new(handle: ClientHandle, fusion: FusionHandle) -> Self {
        Self {
            handle,
            fusion,
            state: ConnectionState::Connected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// # Run
    ///
    /// Registers the connection, then reads frames until the connection
    /// terminates.
    ///
    /// ## Logic:
    /// 1.  Each `Data` frame is decoded and stamped with the current server time
    ///     before it is submitted. A payload that fails to decode is logged and
    ///     skipped; the connection stays open.
    /// 2.  `Close`, a read error or the end of the stream terminates the loop.
    /// 3.  If registration succeeded, exactly one unregister is sent on the way
    ///     out, whatever the reason for termination.
    pub async fn run<S, E>(mut self, frames: S) -> ConnectionReport
    where
        S: Stream<Item = Result<InboundFrame, E>>,
        E: fmt::Display,
    {
        let client_id = self.handle.id();
        let mut report = ConnectionReport {
            client_id,
            submitted: 0,
            rejected: 0,
            termination: Termination::CoordinatorClosed,
        };

        if self.fusion.register(self.handle.clone()).is_err() {
            warn!(client_id = %client_id, "Coordinator unavailable, dropping new connection.");
            self.state = ConnectionState::Terminated;
            return report;
        }
        self.state = ConnectionState::Streaming;
        info!(client_id = %client_id, "Connection streaming.");

        let mut frames = pin!(frames);
        report.termination = loop {
            let frame = match frames.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(error)) => {
                    warn!(client_id = %client_id, %error, "Unable to read from connection.");
                    break Termination::Transport(error.to_string());
                }
                None => break Termination::Ended,
            };

            let payload = match frame {
                InboundFrame::Data(payload) => payload,
                InboundFrame::Close => break Termination::Closed,
                InboundFrame::Control => continue,
            };

            let position = match PositionReport::decode(&payload) {
                Ok(position) => position,
                Err(error) => {
                    warn!(client_id = %client_id, %error, "Unable to decode message.");
                    report.rejected += 1;
                    continue;
                }
            };

            if self.fusion.submit(position.stamp(Utc::now())).is_err() {
                break Termination::CoordinatorClosed;
            }
            report.submitted += 1;
        };

        self.state = ConnectionState::Terminated;
        if self.fusion.unregister(client_id).is_err() {
            debug!(client_id = %client_id, "Coordinator stopped before unregister.");
        }
        info!(
            client_id = %client_id,
            submitted = report.submitted,
            rejected = report.rejected,
            reason = %report.termination,
            "Connection terminated."
        );
        report
    }
}
