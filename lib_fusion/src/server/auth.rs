//! # Inspection Guard
//!
//! The gateway does not authenticate anyone itself. It exposes the point where
//! an externally supplied `AuthGuard` is consulted before `/debug` and
//! `/export` run; a refused request is answered with `401 Unauthorized` and
//! never reaches the handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Decides whether a request may see inspection data.
pub trait AuthGuard: Send + Sync + 'static {
    fn authorize(&self, request: &Request) -> bool;
}

impl<F> AuthGuard for F
where
    F: Fn(&Request) -> bool + Send + Sync + 'static,
{
    fn authorize(&self, request: &Request) -> bool {
        self(request)
    }
}

/// Shared guard as stored in the middleware state.
pub type SharedGuard = Arc<dyn AuthGuard>;

/// # Token Guard
///
/// Accepts requests carrying `Authorization: Bearer <token>` with the
/// configured token. With no token configured every request is refused.
#[derive(Debug, Clone)]
pub struct TokenGuard {
    token: Option<String>,
}

impl TokenGuard {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|token| !token.is_empty()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.token.is_some()
    }
}

impl AuthGuard for TokenGuard {
    fn authorize(&self, request: &Request) -> bool {
        let Some(expected) = self.token.as_deref() else {
            return false;
        };
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| presented == expected)
    }
}

/// Middleware invoking the guard. Installed with
/// `axum::middleware::from_fn_with_state(guard, require_auth)`.
pub async fn require_auth(State(guard): State<SharedGuard>, request: Request, next: Next) -> Response {
    if guard.authorize(&request) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Refusing unauthorized inspection request.");
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
        "unauthorized",
    )
        .into_response()
}
