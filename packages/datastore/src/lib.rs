#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Check-in datastore contract and an in-memory implementation.
//!
//! The visibility aggregator only needs three queries from its backing
//! store: every check-in for a landmark on a given day, whether a point is
//! near a landmark, and every check-in for a landmark on a given day that
//! falls inside a grid cell. [`CheckinStore`] captures exactly that.
//! [`memory::MemoryStore`] implements it over landmark boundary polygons
//! and is loadable from a TOML fixture (see [`fixture`]).

pub mod fixture;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use visibility_map_checkin_models::{Checkin, Coordinates, LandmarkId};
use visibility_map_grid::Cell;
use visibility_map_location::LocationError;

pub use memory::MemoryStore;

/// Errors that can occur during datastore operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatastoreError {
    /// The landmark is not known to the store.
    #[error("Unknown landmark: {landmark}")]
    UnknownLandmark {
        /// The requested landmark.
        landmark: LandmarkId,
    },

    /// A stored or recorded check-in has an unparseable location.
    #[error("Invalid check-in location: {0}")]
    InvalidLocation(#[from] LocationError),

    /// A fixture document could not be loaded.
    #[error("Fixture error: {message}")]
    Fixture {
        /// Description of what went wrong.
        message: String,
    },

    /// The backing store failed.
    #[error("Datastore backend error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// Queries the visibility aggregator runs against its backing store.
///
/// `timestamp` selects the day (UTC) being aggregated. Each returned
/// [`Checkin::age`] is the number of whole hours between the check-in and
/// `timestamp`.
#[async_trait]
pub trait CheckinStore: Send + Sync {
    /// Returns every check-in recorded for `landmark` on the day of
    /// `timestamp`, up to and including `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if the query fails.
    async fn checkins_for_day(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
    ) -> Result<Vec<Checkin>, DatastoreError>;

    /// Whether `coords` is close enough to `landmark` to count towards its
    /// visibility layer.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if the query fails.
    async fn near_landmark(
        &self,
        coords: Coordinates,
        landmark: LandmarkId,
    ) -> Result<bool, DatastoreError>;

    /// Same as [`Self::checkins_for_day`], restricted to check-ins inside
    /// `cell` (boundary inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if the query fails.
    async fn checkins_for_day_in_cell(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
        cell: &Cell,
    ) -> Result<Vec<Checkin>, DatastoreError>;
}
