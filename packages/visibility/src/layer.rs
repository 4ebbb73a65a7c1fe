//! Visibility layers: one `GeoJSON` feature per observed grid cell.

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, feature::Id};
use serde::{Serialize, Serializer};
use visibility_map_grid::Cell;

use crate::aggregate::CellScores;

/// The aggregated scores for one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFeature {
    /// Cell id (see [`Cell::id`]).
    pub id: String,
    /// Bounds of the cell.
    pub cell: Cell,
    /// Latest scores computed for the cell.
    pub scores: CellScores,
}

impl CellFeature {
    /// Converts to a `GeoJSON` feature with `visibility` and `accuracy`
    /// properties and the cell polygon as geometry.
    #[must_use]
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert(
            "visibility".to_string(),
            JsonValue::from(self.scores.visibility),
        );
        properties.insert("accuracy".to_string(), JsonValue::from(self.scores.accuracy));

        Feature {
            bbox: None,
            geometry: Some(self.cell.to_geometry()),
            id: Some(Id::String(self.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Whether an upsert created a feature or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First observation of the cell; a feature was appended.
    Inserted,
    /// The cell's existing feature was overwritten in place.
    Updated,
}

/// All aggregated cells for one landmark, in first-observed order.
///
/// Holds at most one feature per cell id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    features: Vec<CellFeature>,
}

impl Layer {
    /// Creates an empty layer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Features in first-observed order.
    #[must_use]
    pub fn features(&self) -> &[CellFeature] {
        &self.features
    }

    /// Number of cells in the layer.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Finds the feature for a cell id.
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&CellFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Overwrites the scores of `cell`'s feature, appending a new feature
    /// if the cell has not been seen before.
    pub fn upsert(&mut self, cell: &Cell, scores: CellScores) -> Upsert {
        let id = cell.id();

        if let Some(existing) = self.features.iter_mut().find(|f| f.id == id) {
            existing.scores = scores;
            return Upsert::Updated;
        }

        self.features.push(CellFeature {
            id,
            cell: *cell,
            scores,
        });
        Upsert::Inserted
    }

    /// Converts to a `GeoJSON` feature collection.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().map(CellFeature::to_feature).collect(),
            foreign_members: None,
        }
    }
}

impl From<&Layer> for FeatureCollection {
    fn from(layer: &Layer) -> Self {
        layer.to_feature_collection()
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_feature_collection().serialize(serializer)
    }
}
