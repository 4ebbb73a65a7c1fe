#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Well-known text point parsing for check-in locations.
//!
//! Check-in locations are stored as WKT (`POINT(lon lat)`), optionally
//! with an EWKT `SRID=4326;` prefix. Only points are meaningful for a
//! check-in, so every other geometry type is rejected.

use std::sync::LazyLock;

use regex::Regex;
use visibility_map_checkin_models::Coordinates;

/// Errors that can occur while parsing a location string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    /// The string is not valid WKT.
    #[error("Malformed location: {input:?}")]
    Malformed {
        /// The rejected input.
        input: String,
    },

    /// The WKT describes something other than a point.
    #[error("Unsupported geometry type {kind} (expected POINT)")]
    UnsupportedGeometry {
        /// Geometry keyword found in the input.
        kind: String,
    },

    /// `POINT EMPTY` has no coordinates.
    #[error("Location is an empty point")]
    Empty,

    /// The coordinates fall outside the valid WGS84 range.
    #[error("Coordinates out of range: ({longitude}, {latitude})")]
    OutOfRange {
        /// Parsed longitude.
        longitude: f64,
        /// Parsed latitude.
        latitude: f64,
    },
}

const NUMBER: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

static POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:SRID=\d+\s*;\s*)?POINT\s*(?:ZM|Z|M)?\s*\(\s*({NUMBER})\s+({NUMBER})(?:\s+{NUMBER}){{0,2}}\s*\)\s*$"
    ))
    .expect("valid regex")
});

static EMPTY_POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:SRID=\d+\s*;\s*)?POINT\s*(?:ZM|Z|M)?\s+EMPTY\s*$")
        .expect("valid regex")
});

static GEOMETRY_KIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:SRID=\d+\s*;\s*)?([A-Z]+)").expect("valid regex")
});

/// WKT geometry keywords that are well-formed but not points.
const OTHER_GEOMETRY_KINDS: &[&str] = &[
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
    "TRIANGLE",
    "TIN",
    "POLYHEDRALSURFACE",
    "CIRCULARSTRING",
    "COMPOUNDCURVE",
    "CURVEPOLYGON",
];

/// Parses a WKT point into [`Coordinates`].
///
/// Any Z/M ordinates are accepted and discarded.
///
/// # Errors
///
/// Returns [`LocationError`] if the input is not a WKT point, is
/// `POINT EMPTY`, or has coordinates outside longitude [-180, 180] /
/// latitude [-90, 90].
pub fn parse_point(wkt: &str) -> Result<Coordinates, LocationError> {
    let Some(caps) = POINT_RE.captures(wkt) else {
        if EMPTY_POINT_RE.is_match(wkt) {
            return Err(LocationError::Empty);
        }
        let kind = GEOMETRY_KIND_RE
            .captures(wkt)
            .map(|c| c[1].to_uppercase())
            .filter(|kind| OTHER_GEOMETRY_KINDS.contains(&kind.as_str()));
        return Err(kind.map_or_else(
            || malformed(wkt),
            |kind| LocationError::UnsupportedGeometry { kind },
        ));
    };

    let longitude: f64 = caps[1].parse().map_err(|_| malformed(wkt))?;
    let latitude: f64 = caps[2].parse().map_err(|_| malformed(wkt))?;

    if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
        return Err(LocationError::OutOfRange {
            longitude,
            latitude,
        });
    }

    Ok(Coordinates::new(longitude, latitude))
}

fn malformed(input: &str) -> LocationError {
    LocationError::Malformed {
        input: input.to_string(),
    }
}
