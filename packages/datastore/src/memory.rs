//! In-memory [`CheckinStore`] backed by landmark boundary polygons.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::Intersects;
use tokio::sync::RwLock;
use visibility_map_checkin_models::{Checkin, Coordinates, LandmarkId};
use visibility_map_grid::Cell;
use visibility_map_location::parse_point;

use crate::fixture::Fixture;
use crate::{CheckinStore, DatastoreError};

/// A landmark and the area counted as "near" it.
#[derive(Debug, Clone)]
pub struct Landmark {
    pub id: LandmarkId,
    pub name: String,
    pub boundary: geo::Polygon<f64>,
}

impl Landmark {
    /// Builds a landmark from an exterior ring of `[lon, lat]` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError::Fixture`] if the ring has fewer than three
    /// distinct vertices.
    pub fn from_ring(
        id: LandmarkId,
        name: impl Into<String>,
        ring: &[[f64; 2]],
    ) -> Result<Self, DatastoreError> {
        let mut exterior: Vec<(f64, f64)> = ring.iter().map(|[x, y]| (*x, *y)).collect();
        if exterior.len() > 1 && exterior.first() == exterior.last() {
            exterior.pop();
        }
        if exterior.len() < 3 {
            return Err(DatastoreError::Fixture {
                message: format!("landmark {id} boundary needs at least 3 vertices"),
            });
        }

        Ok(Self {
            id,
            name: name.into(),
            boundary: geo::Polygon::new(geo::LineString::from(exterior), vec![]),
        })
    }

    /// Whether `coords` lies inside the boundary or on its edge.
    #[must_use]
    pub fn covers(&self, coords: Coordinates) -> bool {
        self.boundary
            .intersects(&geo::Point::new(coords.longitude, coords.latitude))
    }
}

#[derive(Debug, Clone)]
struct RecordedCheckin {
    landmark: LandmarkId,
    location: String,
    coords: Coordinates,
    recorded_at: DateTime<Utc>,
    visibility: f64,
}

impl RecordedCheckin {
    /// Converts to a [`Checkin`] aged relative to `timestamp`, or `None` if
    /// it was not recorded on the same UTC day at or before `timestamp`.
    fn as_of(&self, timestamp: DateTime<Utc>) -> Option<Checkin> {
        if self.recorded_at > timestamp || self.recorded_at.date_naive() != timestamp.date_naive()
        {
            return None;
        }

        let hours = (timestamp - self.recorded_at).num_hours();
        let age = u32::try_from(hours).unwrap_or(u32::MAX);

        Some(Checkin::new(self.location.clone(), age, self.visibility).with_coords(self.coords))
    }
}

/// Check-in store held entirely in memory.
///
/// Landmarks are fixed at construction; check-ins can be recorded at any
/// time through a shared reference.
#[derive(Debug, Default)]
pub struct MemoryStore {
    landmarks: BTreeMap<LandmarkId, Landmark>,
    checkins: RwLock<Vec<RecordedCheckin>>,
}

impl MemoryStore {
    /// Creates a store knowing the given landmarks and no check-ins.
    #[must_use]
    pub fn new(landmarks: impl IntoIterator<Item = Landmark>) -> Self {
        Self {
            landmarks: landmarks.into_iter().map(|l| (l.id, l)).collect(),
            checkins: RwLock::new(Vec::new()),
        }
    }

    /// Builds a store from a parsed [`Fixture`].
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if a landmark boundary is degenerate, a
    /// check-in references an unknown landmark, or a check-in location is
    /// not a valid WKT point.
    pub fn from_fixture(fixture: &Fixture) -> Result<Self, DatastoreError> {
        let landmarks = fixture
            .landmarks
            .iter()
            .map(|l| Landmark::from_ring(l.id, l.name.clone(), &l.boundary))
            .collect::<Result<Vec<_>, _>>()?;

        let store = Self::new(landmarks);
        let mut recorded = Vec::with_capacity(fixture.checkins.len());
        for checkin in &fixture.checkins {
            recorded.push(store.prepare(
                checkin.landmark,
                &checkin.location,
                checkin.recorded_at,
                checkin.visibility,
            )?);
        }

        log::debug!(
            "Loaded fixture with {} landmarks and {} check-ins",
            store.landmarks.len(),
            recorded.len()
        );

        Ok(Self {
            landmarks: store.landmarks,
            checkins: RwLock::new(recorded),
        })
    }

    /// Parses a TOML fixture document and builds a store from it.
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if the document or its contents are
    /// invalid. See [`Self::from_fixture`].
    pub fn from_fixture_toml(document: &str) -> Result<Self, DatastoreError> {
        Self::from_fixture(&Fixture::from_toml(document)?)
    }

    /// Looks up a landmark.
    #[must_use]
    pub fn landmark(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    /// Records a new check-in and returns it as seen at `recorded_at`
    /// (age 0, coordinates attached).
    ///
    /// # Errors
    ///
    /// Returns [`DatastoreError`] if the landmark is unknown or the
    /// location is not a valid WKT point.
    pub async fn record(
        &self,
        landmark: LandmarkId,
        location: &str,
        recorded_at: DateTime<Utc>,
        visibility: f64,
    ) -> Result<Checkin, DatastoreError> {
        let entry = self.prepare(landmark, location, recorded_at, visibility)?;
        let checkin = Checkin::new(location, 0, visibility).with_coords(entry.coords);
        self.checkins.write().await.push(entry);
        Ok(checkin)
    }

    fn prepare(
        &self,
        landmark: LandmarkId,
        location: &str,
        recorded_at: DateTime<Utc>,
        visibility: f64,
    ) -> Result<RecordedCheckin, DatastoreError> {
        self.require_landmark(landmark)?;
        let coords = parse_point(location)?;

        Ok(RecordedCheckin {
            landmark,
            location: location.to_string(),
            coords,
            recorded_at,
            visibility,
        })
    }

    fn require_landmark(&self, landmark: LandmarkId) -> Result<&Landmark, DatastoreError> {
        self.landmarks
            .get(&landmark)
            .ok_or(DatastoreError::UnknownLandmark { landmark })
    }

    async fn query<F>(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
        filter: F,
    ) -> Result<Vec<Checkin>, DatastoreError>
    where
        F: Fn(&RecordedCheckin) -> bool + Send,
    {
        self.require_landmark(landmark)?;

        let checkins = self.checkins.read().await;
        Ok(checkins
            .iter()
            .filter(|c| c.landmark == landmark && filter(c))
            .filter_map(|c| c.as_of(timestamp))
            .collect())
    }
}

#[async_trait]
impl CheckinStore for MemoryStore {
    async fn checkins_for_day(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
    ) -> Result<Vec<Checkin>, DatastoreError> {
        self.query(timestamp, landmark, |_| true).await
    }

    async fn near_landmark(
        &self,
        coords: Coordinates,
        landmark: LandmarkId,
    ) -> Result<bool, DatastoreError> {
        Ok(self.require_landmark(landmark)?.covers(coords))
    }

    async fn checkins_for_day_in_cell(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
        cell: &Cell,
    ) -> Result<Vec<Checkin>, DatastoreError> {
        let cell = *cell;
        self.query(timestamp, landmark, move |c| cell.contains(c.coords))
            .await
    }
}
