//! # Client Registry
//!
//! The ordered set of currently connected sources. Only the fusion coordinator
//! owns a `ClientRegistry`, so membership is changed from a single task and the
//! collection needs no lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one accepted connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// # Client Handle
///
/// The registry's bookkeeping entry for one live connection. It does not own
/// the socket; the connection's handler task does. The remaining fields exist
/// only so inspectors can tell clients apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientHandle {
    id: ClientId,
    agent: Option<String>,
    connected_at: DateTime<Utc>,
}

impl ClientHandle {
    /// Creates a handle with a fresh identity for a connection accepted now.
    pub fn new(agent: Option<String>) -> Self {
        Self {
            id: ClientId::next(),
            agent,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The `User-Agent` the source presented when upgrading, if any.
    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client {} connected_at={} agent={}",
            self.id,
            self.connected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.agent.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The handle was never added or has already been removed.
    #[error("client {0} is not registered")]
    NotFound(ClientId),
}

/// # Client Registry
///
/// Append-only insertion, removal by identity with a linear scan. Client counts
/// for a single gateway are small enough that O(n) removal is not a concern.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Vec<ClientHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: ClientHandle) {
        self.clients.push(handle);
    }

    /// Removes the handle with the given identity, preserving the order of the
    /// remaining clients.
    ///
    /// Removing an identity that is not present is reported as
    /// `RegistryError::NotFound`; it signals a lifecycle bug in the caller but
    /// leaves the registry untouched.
    pub fn remove(&mut self, id: ClientId) -> Result<ClientHandle, RegistryError> {
        let index = self
            .clients
            .iter()
            .position(|client| client.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        Ok(self.clients.remove(index))
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.iter().any(|client| client.id == id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients in the order they were admitted.
    pub fn iter(&self) -> impl Iterator<Item = &ClientHandle> {
        self.clients.iter()
    }
}
