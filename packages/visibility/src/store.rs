//! Owned, shareable mapping from landmark to its visibility layer.

use std::collections::BTreeMap;

use geojson::FeatureCollection;
use tokio::sync::RwLock;
use visibility_map_checkin_models::LandmarkId;
use visibility_map_grid::Cell;

use crate::aggregate::CellScores;
use crate::layer::{Layer, Upsert};

/// Landmark layers guarded by a single async lock.
///
/// Every mutation is a short synchronous section under the write lock;
/// callers never hold the lock across a datastore query.
#[derive(Debug, Default)]
pub struct LayerStore {
    layers: RwLock<BTreeMap<LandmarkId, Layer>>,
}

impl LayerStore {
    /// Creates a store with no layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty layer for `landmark` unless one already exists.
    pub async fn ensure(&self, landmark: LandmarkId) {
        self.layers.write().await.entry(landmark).or_default();
    }

    /// Replaces the landmark's layer with a fresh empty one.
    pub async fn reset(&self, landmark: LandmarkId) {
        self.layers.write().await.insert(landmark, Layer::new());
    }

    /// Returns a snapshot of the landmark's layer, if it has one.
    pub async fn layer(&self, landmark: LandmarkId) -> Option<Layer> {
        self.layers.read().await.get(&landmark).cloned()
    }

    /// Returns a snapshot of the landmark's layer, or an empty layer.
    pub async fn layer_or_empty(&self, landmark: LandmarkId) -> Layer {
        self.layer(landmark).await.unwrap_or_default()
    }

    /// The landmark's layer as `GeoJSON`. Empty if never initialized.
    pub async fn feature_collection(&self, landmark: LandmarkId) -> FeatureCollection {
        self.layers
            .read()
            .await
            .get(&landmark)
            .map_or_else(|| Layer::new().to_feature_collection(), Layer::to_feature_collection)
    }

    /// Upserts `cell`'s scores into the landmark's layer, creating the layer
    /// if needed.
    pub async fn upsert(&self, landmark: LandmarkId, cell: &Cell, scores: CellScores) -> Upsert {
        self.layers
            .write()
            .await
            .entry(landmark)
            .or_default()
            .upsert(cell, scores)
    }
}
