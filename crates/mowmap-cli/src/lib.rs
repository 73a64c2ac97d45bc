//! Mowmap CLI - operator tools for the mower map.
//!
//! Binaries:
//! - map_watch: follow pose/map/plan streams and log the live features
//! - map_export: write the current map as a raw backup or GeoJSON
//! - map_restore: push a raw backup through the full-replace save

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mowmap_core::models::MapSnapshot;

/// Initialize tracing with `RUST_LOG` plus a default directive for our crates.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mowmap_sdk=info".parse()?)
                .add_directive("mowmap_cli=info".parse()?),
        )
        .init();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Raw map snapshot, restorable with map_restore
    Backup,
    /// GeoJSON FeatureCollection of the built features
    Geojson,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Backup => "json",
            ExportFormat::Geojson => "geojson",
        }
    }
}

/// Default export file name, e.g. `map-20240501-142233.geojson`.
pub fn export_file_name(format: ExportFormat, at: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!(
        "map-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    ))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Read a raw map backup.
pub fn read_backup(path: &Path) -> Result<MapSnapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing map backup {}", path.display()))
}
