//! # lib_fusion
//!
//! Building blocks of the position fusion gateway, gated by feature in the
//! same way as the rest of the workspace's libraries:
//!
//! - **`engine`**: position records, client registry, track store, the fusion
//!   coordinator and the per-connection handler.
//! - **`server`**: the axum router exposing WebSocket ingress and the guarded
//!   inspection endpoints.
//! - **`loggers`**: `tracing` subscriber setup shared by the binaries.

#[cfg(feature = "engine")]
pub mod engine;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "loggers")]
pub mod loggers;
