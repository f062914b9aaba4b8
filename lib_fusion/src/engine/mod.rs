//! # Fusion Engine Module
//!
//! The real-time position-fusion engine: many connection handlers feed one
//! coordinator task, which is the only code that ever mutates the fused state.
//!
//! ## Core Components:
//!
//! - **`position`**: the inbound wire report and the immutable, server-stamped
//!   record stored per track.
//! - **`registry`**: identities of live connections and the ordered set the
//!   coordinator keeps them in.
//! - **`track_store`**: track identifier to arrival-ordered history.
//! - **`coordinator`**: the single-consumer event loop owning registry and
//!   store, and the `FusionHandle` producers use to reach it.
//! - **`connection`**: the per-connection read loop that decodes, stamps and
//!   submits reports.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Per-connection read loop.
pub mod connection;
/// Single-writer event loop over the fused state.
pub mod coordinator;
/// Wire reports and stored records.
pub mod position;
/// Live connection bookkeeping.
pub mod registry;
/// Per-track position histories.
pub mod track_store;

// --- Public API Re-exports ---
pub use connection::{ConnectionHandler, ConnectionReport, ConnectionState, InboundFrame, Termination};
pub use coordinator::{FusionCoordinator, FusionError, FusionEvent, FusionHandle, FusionSnapshot};
pub use position::{DecodeError, PositionRecord, PositionReport};
pub use registry::{ClientHandle, ClientId, ClientRegistry, RegistryError};
pub use track_store::{TrackExport, TrackStore};
