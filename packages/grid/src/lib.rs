#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fixed-precision grid cells for bucketing check-ins.
//!
//! The map is divided into axis-aligned cells `10^-p` degrees wide, where
//! `p` is the grid size (number of decimal digits kept). A coordinate is
//! bucketed by flooring each axis to `p` digits, so every point inside the
//! same bucket produces bit-identical cell bounds and therefore the same
//! cell id.

use geo::Intersects;
use serde::{Deserialize, Serialize};
use visibility_map_checkin_models::Coordinates;

/// Largest supported grid size. Beyond this, `10^-p` approaches the
/// precision limit of `f64` degrees and cells stop being stable.
pub const MAX_GRID_SIZE: u8 = 10;

/// Default grid size (two decimal digits, roughly 1.1 km of latitude).
pub const DEFAULT_GRID_SIZE: u8 = 2;

/// Errors that can occur when configuring the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Grid size outside `0..=MAX_GRID_SIZE`.
    #[error("invalid grid size {value}: expected 0-10")]
    InvalidGridSize {
        /// The rejected grid size.
        value: u8,
    },
}

/// Grid precision in decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GridSize(u8);

impl GridSize {
    /// Creates a grid size.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidGridSize`] if `value` exceeds
    /// [`MAX_GRID_SIZE`].
    pub const fn new(value: u8) -> Result<Self, GridError> {
        if value > MAX_GRID_SIZE {
            return Err(GridError::InvalidGridSize { value });
        }
        Ok(Self(value))
    }

    /// Returns the number of decimal digits kept.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Width of one cell in degrees (`10^-p`).
    #[must_use]
    pub fn step(self) -> f64 {
        10_f64.powi(-i32::from(self.0))
    }

    /// Cells per degree (`10^p`).
    fn scale(self) -> f64 {
        10_f64.powi(i32::from(self.0))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self(DEFAULT_GRID_SIZE)
    }
}

impl TryFrom<u8> for GridSize {
    type Error = GridError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GridSize> for u8 {
    fn from(size: GridSize) -> Self {
        size.0
    }
}

impl std::fmt::Display for GridSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Floors `number` to `precision` decimal digits.
#[must_use]
pub fn round_down(number: f64, precision: GridSize) -> f64 {
    let scale = precision.scale();
    // Adding 0.0 turns -0.0 into 0.0 so ids never render as "-0".
    grid_index(number, scale) / scale + 0.0
}

/// Index of the grid line at or below `value`, so that
/// `index / scale <= value <= (index + 1) / scale` holds for the rounded
/// quotients too.
fn grid_index(value: f64, scale: f64) -> f64 {
    let index = (value * scale).floor();
    if index / scale > value {
        index - 1.0
    } else if (index + 1.0) / scale < value {
        index + 1.0
    } else {
        index
    }
}

/// A closed rectangular grid cell `[left, right] x [bottom, top]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Western bound (longitude).
    pub left: f64,
    /// Eastern bound (longitude).
    pub right: f64,
    /// Southern bound (latitude).
    pub bottom: f64,
    /// Northern bound (latitude).
    pub top: f64,
}

impl Cell {
    /// Returns the cell containing `coords` at the given grid size.
    ///
    /// Bounds are derived from integer grid indices, so `right` and `top`
    /// are always one full step past `left` and `bottom`, and neighbouring
    /// cells share bit-identical edges.
    #[must_use]
    pub fn containing(coords: Coordinates, grid_size: GridSize) -> Self {
        let scale = grid_size.scale();
        let column = grid_index(coords.longitude, scale);
        let row = grid_index(coords.latitude, scale);

        Self {
            left: column / scale + 0.0,
            right: (column + 1.0) / scale + 0.0,
            bottom: row / scale + 0.0,
            top: (row + 1.0) / scale + 0.0,
        }
    }

    /// Closed exterior ring as `[lon, lat]` pairs: top-left, top-right,
    /// bottom-right, bottom-left, top-left.
    #[must_use]
    pub const fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.left, self.top],
            [self.right, self.top],
            [self.right, self.bottom],
            [self.left, self.bottom],
            [self.left, self.top],
        ]
    }

    /// Stable identifier built from the ring vertices: each vertex is
    /// rendered as `lon|lat` and the vertices are joined with `||`.
    #[must_use]
    pub fn id(&self) -> String {
        self.ring()
            .iter()
            .map(|[lon, lat]| format!("{lon}|{lat}"))
            .collect::<Vec<_>>()
            .join("||")
    }

    /// The cell as a [`geo::Polygon`].
    #[must_use]
    pub fn polygon(&self) -> geo::Polygon<f64> {
        let exterior: Vec<(f64, f64)> = self.ring().iter().map(|[x, y]| (*x, *y)).collect();
        geo::Polygon::new(geo::LineString::from(exterior), vec![])
    }

    /// Whether `coords` lies inside the cell or on its boundary.
    #[must_use]
    pub fn contains(&self, coords: Coordinates) -> bool {
        self.polygon()
            .intersects(&geo::Point::new(coords.longitude, coords.latitude))
    }

    /// The cell as a `GeoJSON` polygon geometry.
    #[must_use]
    pub fn to_geometry(&self) -> geojson::Geometry {
        let ring: Vec<Vec<f64>> = self.ring().iter().map(|p| p.to_vec()).collect();
        geojson::Geometry::new(geojson::Value::Polygon(vec![ring]))
    }
}
