//! Restore a map backup by replacing every area on the backend.

use std::path::PathBuf;

use clap::Parser;

use mowmap_cli::read_backup;
use mowmap_core::features::{build_from_snapshot, build_save_plan, by_id};
use mowmap_sdk::{MapSyncService, SyncConfig};

/// Replace the mower map with a backup written by map_export
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Backend URL
    #[arg(long, env = "MOWMAP_URL", default_value = "http://localhost:4006")]
    url: String,

    /// Backup file
    backup: PathBuf,

    /// Print the areas that would be submitted and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mowmap_cli::init_tracing()?;
    let args = Args::parse();

    let backup = read_backup(&args.backup)?;

    let config = SyncConfig {
        base_url: args.url,
        ..SyncConfig::from_env()
    };
    let service = MapSyncService::connect(config).await?;

    let features = by_id(build_from_snapshot(&backup, service.datum(), service.offsets())?);

    if args.dry_run {
        let plan = build_save_plan(&features, service.datum(), service.offsets())?;
        for request in &plan {
            println!(
                "{} {:?}: {} points, {} obstacles",
                if request.is_navigation_area { "navigation" } else { "working" },
                request.area.name,
                request.area.area.points.len(),
                request.area.obstacles.len()
            );
        }
        return Ok(());
    }

    // The current map tells us which indices to delete afterwards.
    service.refresh_map().await?;
    let report = service.save_with_dock(&features, Some(&backup)).await?;
    println!(
        "Restored {} areas, removed {} old ones",
        report.added, report.deleted
    );
    Ok(())
}
