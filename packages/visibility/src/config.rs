//! Aggregator configuration.

use serde::{Deserialize, Serialize};
use visibility_map_grid::GridSize;

use crate::VisibilityError;

/// Environment variable overriding the grid size.
pub const GRID_SIZE_ENV: &str = "VISIBILITY_GRID_SIZE";

/// Settings for [`VisibilityAggregator`](crate::VisibilityAggregator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Grid precision in decimal digits.
    #[serde(default)]
    pub grid_size: GridSize,
}

#[derive(Deserialize)]
struct ConfigDocument {
    config: Option<VisibilityConfig>,
}

impl VisibilityConfig {
    #[must_use]
    pub const fn with_grid_size(grid_size: GridSize) -> Self {
        Self { grid_size }
    }

    /// Reads the configuration from the environment, falling back to the
    /// defaults for anything unset or invalid.
    #[must_use]
    pub fn from_env() -> Self {
        let grid_size = std::env::var(GRID_SIZE_ENV).ok();
        Self {
            grid_size: parse_grid_size(grid_size.as_deref()),
        }
    }

    /// Reads the `[config]` table of a TOML document, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`VisibilityError::Config`] if the document is not valid
    /// TOML or the table holds invalid values.
    pub fn from_toml(document: &str) -> Result<Option<Self>, VisibilityError> {
        toml::from_str::<ConfigDocument>(document)
            .map(|doc| doc.config)
            .map_err(|e| VisibilityError::Config {
                message: e.to_string(),
            })
    }
}

fn parse_grid_size(value: Option<&str>) -> GridSize {
    let Some(value) = value else {
        return GridSize::default();
    };

    match value.trim().parse::<u8>().map(GridSize::new) {
        Ok(Ok(size)) => size,
        _ => {
            log::warn!(
                "Ignoring invalid {GRID_SIZE_ENV}={value:?}, using default grid size {}",
                GridSize::default()
            );
            GridSize::default()
        }
    }
}
