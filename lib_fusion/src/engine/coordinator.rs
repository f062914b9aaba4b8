//! # Fusion Coordinator
//!
//! The single serialization point of the engine. One task owns the
//! `ClientRegistry` and the `TrackStore`; every other task talks to it by
//! pushing a `FusionEvent` onto one FIFO queue through a cloneable
//! `FusionHandle`.
//!
//! ## Core Design Principles:
//!
//! 1.  **Single writer**: lifecycle events (`Connected`, `Disconnected`) and
//!     data events (`Position`) go through the same queue and are applied one
//!     at a time, in the order they were received. Nothing else ever touches
//!     the registry or the store, so neither needs a lock.
//!
//! 2.  **Per-source ordering**: each connection submits from one task, so its
//!     events are applied in submission order. Events from different
//!     connections interleave in queue order.
//!
//! 3.  **Readers get copies**: `Snapshot` and `Export` are request/reply events.
//!     The coordinator answers with copied counters or reference-counted track
//!     histories and moves on; a slow reader never holds coordinator state.
//!
//! 4.  **Unbounded ingest**: the queue is unbounded, so submitting never waits
//!     on the coordinator.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::position::PositionRecord;
use super::registry::{ClientHandle, ClientId, ClientRegistry};
use super::track_store::{TrackExport, TrackStore};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    /// The coordinator task has stopped and no longer accepts events.
    #[error("fusion coordinator is not running")]
    CoordinatorClosed,
}

/// Everything the coordinator can be asked to do.
#[derive(Debug)]
pub enum FusionEvent {
    Connected(ClientHandle),
    Position(PositionRecord),
    Disconnected(ClientId),
    Snapshot(oneshot::Sender<FusionSnapshot>),
    Export(oneshot::Sender<TrackExport>),
}

/// # Fusion Snapshot
///
/// A read-consistent summary of coordinator state at the moment the request
/// was served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionSnapshot {
    pub track_count: usize,
    pub record_count: usize,
    /// Connected clients in admission order.
    pub clients: Vec<ClientHandle>,
}

impl FusionSnapshot {
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

/// # Fusion Handle
///
/// The submission side of the coordinator's queue. Cheap to clone; one copy
/// lives in the HTTP state and one in every connection handler.
#[derive(Debug, Clone)]
pub struct FusionHandle {
    events: mpsc::UnboundedSender<FusionEvent>,
}

impl FusionHandle {
    fn send(&self, event: FusionEvent) -> Result<(), FusionError> {
        self.events
            .send(event)
            .map_err(|_| FusionError::CoordinatorClosed)
    }

    /// Admits a newly accepted connection into the registry.
    pub fn register(&self, handle: ClientHandle) -> Result<(), FusionError> {
        self.send(FusionEvent::Connected(handle))
    }

    /// Queues a stamped record for its track.
    pub fn submit(&self, record: PositionRecord) -> Result<(), FusionError> {
        self.send(FusionEvent::Position(record))
    }

    /// Removes a terminated connection from the registry.
    pub fn unregister(&self, id: ClientId) -> Result<(), FusionError> {
        self.send(FusionEvent::Disconnected(id))
    }

    /// Asks the coordinator for a summary. Every event queued before this call
    /// from the same task is reflected in the answer.
    pub async fn snapshot(&self) -> Result<FusionSnapshot, FusionError> {
        let (reply, response) = oneshot::channel();
        self.send(FusionEvent::Snapshot(reply))?;
        response.await.map_err(|_| FusionError::CoordinatorClosed)
    }

    /// Asks the coordinator for a copy of every track history.
    pub async fn export(&self) -> Result<TrackExport, FusionError> {
        let (reply, response) = oneshot::channel();
        self.send(FusionEvent::Export(reply))?;
        response.await.map_err(|_| FusionError::CoordinatorClosed)
    }
}

/// # Fusion Coordinator
///
/// Owns the shared state and the receiving end of the event queue. Create it
/// with `FusionCoordinator::new`, hand the returned `FusionHandle` to
/// producers and drive the coordinator with `run` on its own task.
#[derive(Debug)]
pub struct FusionCoordinator {
    registry: ClientRegistry,
    tracks: TrackStore,
    events: mpsc::UnboundedReceiver<FusionEvent>,
}

impl FusionCoordinator {
    pub fn new() -> (Self, FusionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            registry: ClientRegistry::new(),
            tracks: TrackStore::new(),
            events: rx,
        };
        (coordinator, FusionHandle { events: tx })
    }

    /// # Run
    ///
    /// Applies events until every `FusionHandle` is dropped or a shutdown
    /// signal arrives.
    ///
    /// On shutdown the queue is closed to new events and whatever is already
    /// queued is still applied before returning. The final summary is returned
    /// so the caller can log it.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> FusionSnapshot {
        info!("Fusion coordinator started.");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        debug!("All fusion handles dropped.");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Fusion coordinator received shutdown signal.");
                    self.events.close();
                    while let Some(event) = self.events.recv().await {
                        self.apply(event);
                    }
                    break;
                }
            }
        }

        let summary = self.snapshot();
        info!(
            tracks = summary.track_count,
            positions = summary.record_count,
            clients = summary.client_count(),
            "Fusion coordinator stopped."
        );
        summary
    }

    /// Applies a single event to the owned state.
    pub fn apply(&mut self, event: FusionEvent) {
        match event {
            FusionEvent::Connected(handle) => {
                let id = handle.id();
                self.registry.add(handle);
                info!(client_id = %id, clients = self.registry.len(), "Client registered.");
            }
            FusionEvent::Position(record) => {
                if record.track().is_empty() {
                    warn!(
                        latitude = record.latitude(),
                        longitude = record.longitude(),
                        "Dropping position without a track identifier."
                    );
                    return;
                }
                let length = self.tracks.append(record);
                debug!(length, "Position appended.");
            }
            FusionEvent::Disconnected(id) => match self.registry.remove(id) {
                Ok(_) => {
                    info!(client_id = %id, clients = self.registry.len(), "Client unregistered.");
                }
                Err(error) => {
                    warn!(%error, "Unable to remove client.");
                }
            },
            FusionEvent::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away before the reply.");
                }
            }
            FusionEvent::Export(reply) => {
                if reply.send(self.tracks.export()).is_err() {
                    debug!("Export requester went away before the reply.");
                }
            }
        }
    }

    pub fn snapshot(&self) -> FusionSnapshot {
        FusionSnapshot {
            track_count: self.tracks.track_count(),
            record_count: self.tracks.record_count(),
            clients: self.registry.iter().cloned().collect(),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }
}
