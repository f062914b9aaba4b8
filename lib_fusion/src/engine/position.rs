//! # Position Records
//!
//! Two shapes of the same fix live here:
//!
//! - **`PositionReport`**: what a source puts on the wire. It is decoded from a
//!   single WebSocket message and carries no trustworthy time.
//! - **`PositionRecord`**: what the fusion engine stores. It is produced only by
//!   stamping a report with the receiving side's clock, so every stored record
//!   has a server-assigned `time`.
//!
//! `speed` and `heading` stay optional all the way through. Zero is a valid
//! reading for both, so an unreported value is never defaulted to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to turn an inbound payload into a `PositionReport`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not a JSON object with the expected fields.
    #[error("invalid position payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// # Position Report
///
/// One report as sent by a source:
/// `{"latitude": f64, "longitude": f64, "speed"?: f64, "heading"?: f64, "track": string}`.
///
/// Unknown fields (including any `time` the sender adds) are ignored. A missing
/// `track` decodes as an empty string and is rejected later by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Ground speed in meters per second, if the source measured it.
    pub speed: Option<f64>,
    /// Heading in degrees, if the source measured it.
    pub heading: Option<f64>,
    /// Name of the logical stream this report belongs to.
    #[serde(default)]
    pub track: String,
}

impl PositionReport {
    /// Decodes a report from the raw bytes of one inbound message.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Consumes the report and fixes it in time as a stored record.
    pub fn stamp(self, time: DateTime<Utc>) -> PositionRecord {
        PositionRecord {
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            track: self.track,
            time,
        }
    }
}

/// # Position Record
///
/// An immutable fix as held in the track store and exported as
/// `{latitude, longitude, speed, heading, track, time}`. Unreported speed or
/// heading is exported as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    latitude: f64,
    longitude: f64,
    speed: Option<f64>,
    heading: Option<f64>,
    track: String,
    time: DateTime<Utc>,
}

impl PositionRecord {
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    /// The moment the receiving side accepted this fix.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}
