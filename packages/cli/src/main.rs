#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the visibility map.
//!
//! `layer` seeds an in-memory datastore from a TOML fixture, builds one
//! landmark's visibility layer and prints it as `GeoJSON`. `range` prints
//! the hour or day buckets leading up to an anchor time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use visibility_map_checkin_models::LandmarkId;
use visibility_map_datastore::MemoryStore;
use visibility_map_date_range::{RangeUnit, TimeBucket, generate_range};
use visibility_map_grid::GridSize;
use visibility_map_visibility::{VisibilityAggregator, VisibilityConfig};

#[derive(Parser)]
#[command(name = "visibility_map", about = "Landmark visibility layers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a landmark's visibility layer from a fixture and print it as `GeoJSON`
    Layer {
        /// TOML fixture with `[[landmarks]]`, `[[checkins]]` and an optional `[config]`
        #[arg(long)]
        fixture: PathBuf,
        /// Landmark to aggregate
        #[arg(long, default_value_t = 1)]
        landmark: u64,
        /// Day to aggregate (RFC 3339). Defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Grid precision in decimal digits (overrides the fixture and environment)
        #[arg(long)]
        grid_size: Option<u8>,
    },
    /// Print the buckets leading up to (and including) an anchor hour
    Range {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        day: u32,
        #[arg(long)]
        hour: u32,
        /// Number of buckets
        #[arg(long, default_value_t = 24)]
        count: usize,
        /// `hours` or `days`
        #[arg(long, default_value = "hours")]
        unit: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Layer {
            fixture,
            landmark,
            at,
            grid_size,
        } => {
            let at = at.unwrap_or_else(Utc::now);
            print_layer(&fixture, LandmarkId(landmark), at, grid_size).await?;
        }
        Commands::Range {
            year,
            month,
            day,
            hour,
            count,
            unit,
        } => {
            let anchor = TimeBucket::new(year, month, day, hour)?;
            let buckets = generate_range(anchor, RangeUnit::parse(&unit)?, count)?;
            println!("{}", serde_json::to_string_pretty(&buckets)?);
        }
    }

    Ok(())
}

/// Loads the fixture, initializes the landmark's layer and prints it.
async fn print_layer(
    fixture: &Path,
    landmark: LandmarkId,
    at: DateTime<Utc>,
    grid_size: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Loading fixture {}", fixture.display());
    let document = std::fs::read_to_string(fixture)?;

    let config = resolve_config(
        grid_size.map(GridSize::new).transpose()?,
        VisibilityConfig::from_toml(&document)?,
    );
    log::debug!("Using grid size {}", config.grid_size);

    let store = MemoryStore::from_fixture_toml(&document)?;
    match store.landmark(landmark) {
        Some(found) => log::info!("Building layer for landmark {landmark} ({})", found.name),
        None => log::warn!("Landmark {landmark} is not defined in {}", fixture.display()),
    }
    let aggregator = VisibilityAggregator::new(Arc::new(store), config);

    let layer = aggregator.initialize(at, landmark).await?;
    println!("{}", serde_json::to_string_pretty(&layer)?);

    Ok(())
}

/// Picks the grid size from the command line, then the fixture, then the
/// environment.
fn resolve_config(flag: Option<GridSize>, fixture: Option<VisibilityConfig>) -> VisibilityConfig {
    flag.map(VisibilityConfig::with_grid_size)
        .or(fixture)
        .unwrap_or_else(VisibilityConfig::from_env)
}
