//! Export the current map as a raw backup or GeoJSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use mowmap_cli::{export_file_name, write_json, ExportFormat};
use mowmap_core::features::feature_collection;
use mowmap_sdk::{MapSyncService, SyncConfig};

/// Download the mower map
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Backend URL
    #[arg(long, env = "MOWMAP_URL", default_value = "http://localhost:4006")]
    url: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Backup)]
    format: ExportFormat,

    /// Output file (defaults to a timestamped name)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mowmap_cli::init_tracing()?;
    let args = Args::parse();

    let config = SyncConfig {
        base_url: args.url,
        ..SyncConfig::from_env()
    };
    let service = MapSyncService::connect(config).await?;
    service.refresh_map().await?;

    let out = args
        .out
        .unwrap_or_else(|| export_file_name(args.format, chrono::Utc::now()));

    match args.format {
        ExportFormat::Backup => {
            let map = service.snapshot().context("no map snapshot received")?;
            write_json(&out, &map)?;
            println!("Wrote backup of {} areas to {}", map.area_count(), out.display());
        }
        ExportFormat::Geojson => {
            let features = service.features();
            let collection = feature_collection(features.values());
            write_json(&out, &collection)?;
            println!("Wrote {} features to {}", collection.features.len(), out.display());
        }
    }

    Ok(())
}
