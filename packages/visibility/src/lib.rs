#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-landmark visibility layers aggregated over a fixed grid.
//!
//! Each landmark owns a `GeoJSON` feature collection with one polygon
//! feature per grid cell in which check-ins have been observed. A feature
//! carries two scores computed from every check-in currently in its cell
//! (see [`aggregate`]). The [`VisibilityAggregator`] builds a layer from a
//! day's worth of check-ins and keeps it current as new check-ins arrive,
//! querying a [`CheckinStore`] for the data.

pub mod aggregate;
pub mod config;
pub mod layer;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use geojson::FeatureCollection;
use visibility_map_checkin_models::{Checkin, Coordinates, LandmarkId};
use visibility_map_datastore::{CheckinStore, DatastoreError};
use visibility_map_grid::{Cell, GridError, GridSize};
use visibility_map_location::{LocationError, parse_point};

pub use aggregate::CellScores;
pub use config::VisibilityConfig;
pub use layer::{CellFeature, Layer, Upsert};
pub use store::LayerStore;

/// Errors that can occur while building or updating a visibility layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisibilityError {
    /// A datastore query failed.
    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    /// A check-in location could not be parsed.
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    /// Invalid grid settings.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Invalid configuration document.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Returns the check-in's coordinates, parsed from its WKT location.
///
/// Coordinates attached by the datastore are not trusted: the location
/// string is the source of truth, and a mismatch is logged.
///
/// # Errors
///
/// Returns [`LocationError`] if the location is not a valid WKT point.
pub fn checkin_coordinates(checkin: &Checkin) -> Result<Coordinates, LocationError> {
    let coords = parse_point(&checkin.location)?;
    if checkin.coords.is_some_and(|attached| attached != coords) {
        log::debug!(
            "Ignoring attached coordinates {:?} for check-in at {}",
            checkin.coords,
            checkin.location
        );
    }
    Ok(coords)
}

/// Builds and maintains visibility layers from a [`CheckinStore`].
pub struct VisibilityAggregator {
    datastore: Arc<dyn CheckinStore>,
    layers: Arc<LayerStore>,
    grid_size: GridSize,
}

impl VisibilityAggregator {
    /// Creates an aggregator with its own empty [`LayerStore`].
    #[must_use]
    pub fn new(datastore: Arc<dyn CheckinStore>, config: VisibilityConfig) -> Self {
        Self::with_layers(datastore, Arc::new(LayerStore::new()), config)
    }

    /// Creates an aggregator writing into an existing [`LayerStore`].
    #[must_use]
    pub fn with_layers(
        datastore: Arc<dyn CheckinStore>,
        layers: Arc<LayerStore>,
        config: VisibilityConfig,
    ) -> Self {
        Self {
            datastore,
            layers,
            grid_size: config.grid_size,
        }
    }

    /// The layer store this aggregator writes into.
    #[must_use]
    pub const fn layers(&self) -> &Arc<LayerStore> {
        &self.layers
    }

    /// Grid precision used to bucket check-ins.
    #[must_use]
    pub const fn grid_size(&self) -> GridSize {
        self.grid_size
    }

    /// The landmark's layer as `GeoJSON`. Empty if it was never initialized.
    pub async fn layer(&self, landmark: LandmarkId) -> FeatureCollection {
        self.layers.feature_collection(landmark).await
    }

    /// Rebuilds the landmark's layer from every check-in on the day of
    /// `timestamp`.
    ///
    /// All per-check-in updates run concurrently; partial results are
    /// visible in the [`LayerStore`] while they run. If any update fails
    /// the others still complete, and the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`VisibilityError::Datastore`] if fetching the day's
    /// check-ins fails (the existing layer is left untouched), or the first
    /// error raised by an individual update.
    pub async fn initialize(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
    ) -> Result<Layer, VisibilityError> {
        log::info!("Initializing visibility layer for landmark {landmark} at {timestamp}");
        self.layers.ensure(landmark).await;

        let checkins = self
            .datastore
            .checkins_for_day(timestamp, landmark)
            .await
            .inspect_err(|e| {
                log::error!("Failed to fetch check-ins for landmark {landmark}: {e}");
            })?;

        self.layers.reset(landmark).await;

        if checkins.is_empty() {
            log::info!("No check-ins for landmark {landmark}, layer is empty");
            return Ok(self.layers.layer_or_empty(landmark).await);
        }

        let total = checkins.len();
        let results = join_all(
            checkins
                .iter()
                .map(|checkin| self.apply_checkin(timestamp, landmark, checkin)),
        )
        .await;

        let mut first_error = None;
        let mut failed = 0_usize;
        for result in results {
            if let Err(e) = result {
                log::warn!("Check-in update failed for landmark {landmark}: {e}");
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            log::error!(
                "Visibility layer for landmark {landmark} incomplete: {failed}/{total} check-ins failed"
            );
            return Err(e);
        }

        let layer = self.layers.layer_or_empty(landmark).await;
        log::info!(
            "Visibility layer initialized for landmark {landmark}: {total} check-ins, {} cells",
            layer.len()
        );
        Ok(layer)
    }

    /// Recomputes the cell containing `checkin` and upserts its feature.
    ///
    /// Check-ins that are not near the landmark, or whose cell turns out
    /// to be empty, leave the layer unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`VisibilityError`] if the check-in location cannot be
    /// parsed or a datastore query fails. The layer is not modified.
    pub async fn update_with_checkin(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
        checkin: &Checkin,
    ) -> Result<Layer, VisibilityError> {
        self.apply_checkin(timestamp, landmark, checkin).await?;
        Ok(self.layers.layer_or_empty(landmark).await)
    }

    async fn apply_checkin(
        &self,
        timestamp: DateTime<Utc>,
        landmark: LandmarkId,
        checkin: &Checkin,
    ) -> Result<Option<Upsert>, VisibilityError> {
        let coords = checkin_coordinates(checkin)?;

        if !self.datastore.near_landmark(coords, landmark).await? {
            log::debug!(
                "Skipping check-in at {} (not near landmark {landmark})",
                checkin.location
            );
            return Ok(None);
        }

        let cell = Cell::containing(coords, self.grid_size);
        let in_cell = self
            .datastore
            .checkins_for_day_in_cell(timestamp, landmark, &cell)
            .await?;

        let Some(scores) = CellScores::from_checkins(&in_cell) else {
            log::debug!("Cell {} has no check-ins, leaving layer unchanged", cell.id());
            return Ok(None);
        };

        let outcome = self.layers.upsert(landmark, &cell, scores).await;
        log::trace!(
            "{outcome:?} cell {} for landmark {landmark} ({} check-ins): visibility={} accuracy={}",
            cell.id(),
            in_cell.len(),
            scores.visibility,
            scores.accuracy
        );
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone as _;
    use visibility_map_datastore::MemoryStore;
    use visibility_map_datastore::memory::Landmark;

    use super::*;

    const TOWER: LandmarkId = LandmarkId(1);
    const PIER: LandmarkId = LandmarkId(2);

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 2, 10, hour, 0, 0).unwrap()
    }

    fn memory_store() -> MemoryStore {
        MemoryStore::new([
            Landmark::from_ring(TOWER, "Tower", &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
                .unwrap(),
            Landmark::from_ring(PIER, "Pier", &[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0]])
                .unwrap(),
        ])
    }

    fn aggregator(store: Arc<dyn CheckinStore>) -> VisibilityAggregator {
        VisibilityAggregator::new(store, VisibilityConfig::default())
    }

    /// Wraps a [`MemoryStore`] and injects failures or raw check-ins.
    struct ScriptedStore {
        inner: MemoryStore,
        fail_day: bool,
        fail_cells_west_of: Option<f64>,
        extra: Vec<Checkin>,
    }

    impl ScriptedStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                fail_day: false,
                fail_cells_west_of: None,
                extra: Vec::new(),
            }
        }
    }

    fn backend_error() -> DatastoreError {
        DatastoreError::Backend {
            message: "connection reset".to_string(),
        }
    }

    #[async_trait]
    impl CheckinStore for ScriptedStore {
        async fn checkins_for_day(
            &self,
            timestamp: DateTime<Utc>,
            landmark: LandmarkId,
        ) -> Result<Vec<Checkin>, DatastoreError> {
            if self.fail_day {
                return Err(backend_error());
            }
            let mut checkins = self.inner.checkins_for_day(timestamp, landmark).await?;
            checkins.extend(self.extra.iter().cloned());
            Ok(checkins)
        }

        async fn near_landmark(
            &self,
            coords: Coordinates,
            landmark: LandmarkId,
        ) -> Result<bool, DatastoreError> {
            self.inner.near_landmark(coords, landmark).await
        }

        async fn checkins_for_day_in_cell(
            &self,
            timestamp: DateTime<Utc>,
            landmark: LandmarkId,
            cell: &Cell,
        ) -> Result<Vec<Checkin>, DatastoreError> {
            if self.fail_cells_west_of.is_some_and(|lon| cell.left < lon) {
                return Err(backend_error());
            }
            self.inner
                .checkins_for_day_in_cell(timestamp, landmark, cell)
                .await
        }
    }

    #[tokio::test]
    async fn initialize_without_checkins_yields_empty_layer() {
        let aggregator = aggregator(Arc::new(memory_store()));
        let layer = aggregator.initialize(at(9), TOWER).await.unwrap();
        assert!(layer.is_empty());
        assert!(aggregator.layers().layer(TOWER).await.is_some());
    }

    #[tokio::test]
    async fn initialize_aggregates_each_cell_from_all_its_checkins() {
        let store = memory_store();
        store.record(TOWER, "POINT(0.123 0.456)", at(9), 1.0).await.unwrap();
        store.record(TOWER, "POINT(0.128 0.459)", at(8), 1.0).await.unwrap();
        store.record(TOWER, "POINT(0.5 0.5)", at(7), 0.5).await.unwrap();

        let aggregator = aggregator(Arc::new(store));
        let layer = aggregator.initialize(at(9), TOWER).await.unwrap();
        assert_eq!(layer.len(), 2);

        let shared = Cell::containing(Coordinates::new(0.123, 0.456), aggregator.grid_size());
        let feature = layer.feature(&shared.id()).unwrap();
        assert!((feature.scores.visibility - 0.95).abs() < 1e-12);
        assert!((feature.scores.accuracy - 95.0).abs() < 1e-12);

        let single = Cell::containing(Coordinates::new(0.5, 0.5), aggregator.grid_size());
        let feature = layer.feature(&single.id()).unwrap();
        assert!((feature.scores.visibility - 0.4).abs() < 1e-12);
        assert!((feature.scores.accuracy - 80.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn initialize_skips_checkins_outside_the_landmark() {
        let store = memory_store();
        store.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();
        store.record(TOWER, "POINT(3.5 3.5)", at(9), 1.0).await.unwrap();

        let aggregator = aggregator(Arc::new(store));
        let layer = aggregator.initialize(at(9), TOWER).await.unwrap();
        assert_eq!(layer.len(), 1);
    }

    #[tokio::test]
    async fn initialize_twice_rebuilds_the_same_layer() {
        let store = memory_store();
        store.record(TOWER, "POINT(0.123 0.456)", at(9), 1.0).await.unwrap();
        store.record(TOWER, "POINT(0.5 0.5)", at(7), 0.5).await.unwrap();

        let aggregator = aggregator(Arc::new(store));
        let first = aggregator.initialize(at(9), TOWER).await.unwrap();
        let second = aggregator.initialize(at(9), TOWER).await.unwrap();
        assert_eq!(first.len(), second.len());
        for feature in first.features() {
            assert_eq!(second.feature(&feature.id), Some(feature));
        }
    }

    #[tokio::test]
    async fn update_with_checkin_overwrites_existing_cell() {
        let store = Arc::new(memory_store());
        store.record(TOWER, "POINT(0.123 0.456)", at(8), 0.5).await.unwrap();

        let aggregator = aggregator(store.clone());
        let layer = aggregator.initialize(at(9), TOWER).await.unwrap();
        assert_eq!(layer.len(), 1);
        assert!((layer.features()[0].scores.visibility - 0.45).abs() < 1e-12);

        let checkin = store
            .record(TOWER, "POINT(0.121 0.452)", at(9), 1.0)
            .await
            .unwrap();
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();

        assert_eq!(layer.len(), 1);
        let scores = layer.features()[0].scores;
        assert!((scores.visibility - 0.725).abs() < 1e-12);
        assert!((scores.accuracy - 95.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn update_with_checkin_appends_new_cell() {
        let store = Arc::new(memory_store());
        let aggregator = aggregator(store.clone());
        aggregator.initialize(at(9), TOWER).await.unwrap();

        let checkin = store.record(TOWER, "POINT(0.9 0.9)", at(9), 0.2).await.unwrap();
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();
        assert_eq!(layer.len(), 1);
    }

    #[tokio::test]
    async fn update_with_checkin_not_near_is_a_no_op() {
        let store = Arc::new(memory_store());
        let aggregator = aggregator(store.clone());

        let checkin = store.record(TOWER, "POINT(2.5 2.5)", at(9), 1.0).await.unwrap();
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();
        assert!(layer.is_empty());
    }

    #[tokio::test]
    async fn update_with_checkin_in_empty_cell_is_a_no_op() {
        let aggregator = aggregator(Arc::new(memory_store()));

        // Never recorded, so the cell query finds nothing.
        let checkin = Checkin::new("POINT(0.5 0.5)", 0, 1.0);
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();
        assert!(layer.is_empty());
    }

    #[tokio::test]
    async fn update_with_checkin_parses_location() {
        let store = Arc::new(memory_store());
        store.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();
        let aggregator = aggregator(store);

        let checkin = Checkin::new("POINT(0.5 0.5)", 0, 1.0);
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();
        assert_eq!(layer.len(), 1);

        let bad = Checkin::new("POINT(nowhere)", 0, 1.0);
        let err = aggregator
            .update_with_checkin(at(9), TOWER, &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, VisibilityError::Location(_)));
    }

    #[tokio::test]
    async fn location_wins_over_attached_coordinates() {
        let store = Arc::new(memory_store());
        store.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();
        let aggregator = aggregator(store);

        let checkin =
            Checkin::new("POINT(0.5 0.5)", 0, 1.0).with_coords(Coordinates::new(5.5, 5.5));
        let layer = aggregator
            .update_with_checkin(at(9), TOWER, &checkin)
            .await
            .unwrap();
        let cell = Cell::containing(Coordinates::new(0.5, 0.5), aggregator.grid_size());
        assert_eq!(layer.len(), 1);
        assert!(layer.feature(&cell.id()).is_some());

        let bad = Checkin::new("POINT(nowhere)", 0, 1.0).with_coords(Coordinates::new(0.5, 0.5));
        let err = aggregator
            .update_with_checkin(at(9), TOWER, &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, VisibilityError::Location(_)));
    }

    #[tokio::test]
    async fn initialize_buckets_negative_longitudes() {
        const LONDON: LandmarkId = LandmarkId(3);
        let store = MemoryStore::new([Landmark::from_ring(
            LONDON,
            "Trafalgar Square",
            &[[-0.2, 51.45], [-0.05, 51.45], [-0.05, 51.55], [-0.2, 51.55]],
        )
        .unwrap()]);
        store.record(LONDON, "POINT(-0.1276 51.5072)", at(9), 1.0).await.unwrap();
        store.record(LONDON, "POINT(-0.0728 51.5049)", at(8), 0.5).await.unwrap();

        let aggregator = aggregator(Arc::new(store));
        let layer = aggregator.initialize(at(9), LONDON).await.unwrap();
        assert_eq!(layer.len(), 2);

        for feature in layer.features() {
            assert!(feature.cell.right > feature.cell.left);
            assert!(feature.cell.top > feature.cell.bottom);
        }

        let west = Cell::containing(Coordinates::new(-0.1276, 51.5072), aggregator.grid_size());
        let feature = layer.feature(&west.id()).unwrap();
        assert!((feature.scores.visibility - 1.0).abs() < 1e-12);
        assert!((feature.scores.accuracy - 100.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn initialize_fetch_failure_leaves_prior_layer() {
        let inner = memory_store();
        inner.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();
        let layers = Arc::new(LayerStore::new());

        let healthy = VisibilityAggregator::with_layers(
            Arc::new(ScriptedStore::new(inner)),
            layers.clone(),
            VisibilityConfig::default(),
        );
        healthy.initialize(at(9), TOWER).await.unwrap();

        let mut failing = ScriptedStore::new(memory_store());
        failing.fail_day = true;
        let broken = VisibilityAggregator::with_layers(
            Arc::new(failing),
            layers.clone(),
            VisibilityConfig::default(),
        );

        let err = broken.initialize(at(9), TOWER).await.unwrap_err();
        assert_eq!(err, VisibilityError::Datastore(backend_error()));
        assert_eq!(layers.layer_or_empty(TOWER).await.len(), 1);
    }

    #[tokio::test]
    async fn initialize_reports_first_failure_but_applies_the_rest() {
        let inner = memory_store();
        inner.record(TOWER, "POINT(0.05 0.5)", at(9), 1.0).await.unwrap();
        inner.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();

        let mut scripted = ScriptedStore::new(inner);
        scripted.fail_cells_west_of = Some(0.1);
        let aggregator = aggregator(Arc::new(scripted));

        let err = aggregator.initialize(at(9), TOWER).await.unwrap_err();
        assert_eq!(err, VisibilityError::Datastore(backend_error()));
        assert_eq!(aggregator.layers().layer_or_empty(TOWER).await.len(), 1);
    }

    #[tokio::test]
    async fn initialize_surfaces_unparseable_locations() {
        let inner = memory_store();
        inner.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();

        let mut scripted = ScriptedStore::new(inner);
        scripted.extra.push(Checkin::new("garbage", 0, 1.0));
        let aggregator = aggregator(Arc::new(scripted));

        let err = aggregator.initialize(at(9), TOWER).await.unwrap_err();
        assert!(matches!(err, VisibilityError::Location(_)));
        assert_eq!(aggregator.layers().layer_or_empty(TOWER).await.len(), 1);
    }

    #[tokio::test]
    async fn landmarks_do_not_share_layers() {
        let store = memory_store();
        store.record(TOWER, "POINT(0.5 0.5)", at(9), 1.0).await.unwrap();

        let aggregator = aggregator(Arc::new(store));
        aggregator.initialize(at(9), TOWER).await.unwrap();
        let pier = aggregator.initialize(at(9), PIER).await.unwrap();

        assert!(pier.is_empty());
        assert_eq!(aggregator.layer(TOWER).await.features.len(), 1);
        assert!(aggregator.layer(PIER).await.features.is_empty());
    }

    #[tokio::test]
    async fn layer_for_unknown_landmark_is_empty_collection() {
        let aggregator = aggregator(Arc::new(memory_store()));
        let collection = aggregator.layer(LandmarkId(99)).await;
        assert!(collection.features.is_empty());
    }

    #[tokio::test]
    async fn grid_size_controls_cell_width() {
        let store = memory_store();
        store.record(TOWER, "POINT(0.123 0.456)", at(9), 1.0).await.unwrap();
        store.record(TOWER, "POINT(0.187 0.412)", at(9), 1.0).await.unwrap();

        let coarse = VisibilityAggregator::new(
            Arc::new(store),
            VisibilityConfig::with_grid_size(GridSize::new(1).unwrap()),
        );
        let layer = coarse.initialize(at(9), TOWER).await.unwrap();
        assert_eq!(layer.len(), 1);
    }
}
