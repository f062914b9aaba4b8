//! # Track Store
//!
//! The fused state: every track identifier mapped to its history of position
//! records in arrival order. Histories only grow.
//!
//! Each history sits behind an `Arc` so that an export can hand out the whole
//! store by bumping reference counts. The next append to a history that is
//! still shared with an export copies it first (`Arc::make_mut`), leaving the
//! exported view untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::position::PositionRecord;

/// A point-in-time copy of every track, serialized as
/// `{"<track>": [<record>, ...], ...}` with tracks in lexical order.
pub type TrackExport = BTreeMap<String, Arc<Vec<PositionRecord>>>;

#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct TrackStore {
    tracks: TrackExport,
    #[serde(skip)]
    record_count: usize,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the history named by its track, creating the
    /// history on first use. Returns the new length of that history.
    pub fn append(&mut self, record: PositionRecord) -> usize {
        let history = Arc::make_mut(self.tracks.entry(record.track().to_owned()).or_default());
        history.push(record);
        self.record_count += 1;
        history.len()
    }

    pub fn track(&self, track: &str) -> Option<&[PositionRecord]> {
        self.tracks.get(track).map(|history| history.as_slice())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Total number of records across all tracks.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn export(&self) -> TrackExport {
        self.tracks.clone()
    }
}
