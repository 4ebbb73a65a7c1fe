//! TOML fixtures for seeding a [`MemoryStore`](crate::MemoryStore).
//!
//! ```toml
//! [[landmarks]]
//! id = 1
//! name = "Tower Bridge"
//! boundary = [[-0.078, 51.507], [-0.073, 51.507], [-0.073, 51.504], [-0.078, 51.504]]
//!
//! [[checkins]]
//! landmark = 1
//! location = "POINT(-0.0754 51.5055)"
//! recorded_at = "2016-02-10T09:00:00Z"
//! visibility = 0.8
//! ```
//!
//! Unknown top-level tables are ignored, so the same document can carry
//! settings for other components.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use visibility_map_checkin_models::LandmarkId;

use crate::DatastoreError;

/// Parsed fixture document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Landmarks and their boundaries.
    #[serde(default)]
    pub landmarks: Vec<LandmarkFixture>,
    /// Check-ins to record.
    #[serde(default)]
    pub checkins: Vec<CheckinFixture>,
}

/// A landmark entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkFixture {
    /// Landmark id referenced by check-ins.
    pub id: LandmarkId,
    /// Display name, used in logs.
    #[serde(default)]
    pub name: String,
    /// Exterior ring as `[lon, lat]` pairs. Closing the ring is optional.
    pub boundary: Vec<[f64; 2]>,
}

/// A check-in entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinFixture {
    /// Landmark the check-in belongs to.
    pub landmark: LandmarkId,
    /// WKT point.
    pub location: String,
    /// RFC 3339 timestamp, quoted.
    pub recorded_at: DateTime<Utc>,
    /// Observed visibility, normally in `[0, 1]`.
    pub visibility: f64,
}

impl Fixture {
    /// Parses a fixture document.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::Fixture`] if the document is not valid
    /// TOML or does not match the fixture layout.
    pub fn from_toml(document: &str) -> Result<Self, DatastoreError> {
        toml::from_str(document).map_err(|e| DatastoreError::Fixture {
            message: e.to_string(),
        })
    }
}
