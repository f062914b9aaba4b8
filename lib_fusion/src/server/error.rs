//! # Application Error
//!
//! Failures surfaced to HTTP callers of the ingress and inspection endpoints.
//! Every variant answers with a status code and the error text as a plain
//! body; none of them affect coordinator state.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::engine::FusionError;

#[derive(Debug, Error)]
pub enum AppError {
    /// The WebSocket handshake could not be negotiated.
    #[error("{0}")]
    Upgrade(String),
    /// The coordinator is not serving requests (shutting down).
    #[error(transparent)]
    Fusion(#[from] FusionError),
    /// The export document could not be encoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Upgrade(_) | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Fusion(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upgrade(message) => error!(error = %message, "Unable to upgrade connection."),
            AppError::Fusion(e) => error!(error = %e, "Fusion coordinator unavailable."),
            AppError::Serialization(e) => error!(error = %e, "Unable to encode export."),
        }
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses() {
        assert_eq!(
            AppError::Upgrade("bad handshake".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(FusionError::CoordinatorClosed).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn upgrade_body_is_the_error_text() {
        let error = AppError::Upgrade("Connection header did not include 'upgrade'".into());
        assert_eq!(error.to_string(), "Connection header did not include 'upgrade'");
    }
}
