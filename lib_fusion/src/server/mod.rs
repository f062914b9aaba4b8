//! # Gateway HTTP Surface
//!
//! Axum wiring around the fusion engine: WebSocket ingress, the guarded
//! inspection endpoints and the error type they answer with.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Guard trait, bearer-token guard and the middleware invoking it.
pub mod auth;
/// HTTP-facing error type.
pub mod error;
/// Router and handlers.
pub mod routes;

pub use auth::{AuthGuard, SharedGuard, TokenGuard};
pub use error::AppError;
pub use routes::router;
