#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Check-in observation and landmark types.
//!
//! A check-in is a single observation reported near a landmark: where it
//! was taken (a WKT location string), how old it is relative to the query
//! time (an hour bucket offset) and the visibility sample it carried.
//! These types are shared by the datastore and the visibility aggregator.

use serde::{Deserialize, Serialize};

/// Identifier of a landmark (a fixed point of interest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LandmarkId(pub u64);

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LandmarkId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A longitude/latitude pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Longitude (x).
    pub longitude: f64,
    /// Latitude (y).
    pub latitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// A single check-in as returned by the datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkin {
    /// Location as well-known text (e.g. `"POINT(-0.1276 51.5072)"`).
    pub location: String,
    /// Hour bucket offset relative to the query time. 0 is the most recent.
    pub age: u32,
    /// Visibility sample reported with the check-in.
    pub visibility: f64,
    /// Coordinates parsed from [`Self::location`], once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
}

impl Checkin {
    /// Creates a check-in whose coordinates have not been parsed yet.
    #[must_use]
    pub fn new(location: impl Into<String>, age: u32, visibility: f64) -> Self {
        Self {
            location: location.into(),
            age,
            visibility,
            coords: None,
        }
    }

    /// Attaches parsed coordinates to this check-in.
    #[must_use]
    pub const fn with_coords(mut self, coords: Coordinates) -> Self {
        self.coords = Some(coords);
        self
    }
}
