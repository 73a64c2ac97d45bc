//! Follow the mower's telemetry and log the live map features.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tokio::time;

use mowmap_core::features::{FeatureKind, MapFeature, MOWER_ID};
use mowmap_sdk::{MapSyncService, SyncConfig};

/// Stream pose, map and plan frames from the mower backend
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Backend URL
    #[arg(long, env = "MOWMAP_URL", default_value = "http://localhost:4006")]
    url: String,

    /// Seconds between status lines
    #[arg(long, default_value_t = 5)]
    interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mowmap_cli::init_tracing()?;
    let args = Args::parse();

    let config = SyncConfig {
        base_url: args.url,
        ..SyncConfig::from_env()
    };
    let service = Arc::new(MapSyncService::connect(config).await?);
    let mut notifications = service.notifier().subscribe();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = service.clone();
    let mut sync = tokio::spawn(async move { runner.run(shutdown_rx).await });

    let mut ticker = time::interval(Duration::from_secs(args.interval.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                let _ = shutdown_tx.send(());
                break;
            }
            result = &mut sync => {
                result??;
                return Ok(());
            }
            Ok(note) = notifications.recv() => {
                tracing::info!(level = ?note.level, description = ?note.description, "{}", note.message);
            }
            _ = ticker.tick() => {
                let features = service.features();
                let areas = features
                    .values()
                    .filter(|f| f.kind() == FeatureKind::WorkingArea)
                    .count();
                match features.get(MOWER_ID) {
                    Some(MapFeature::Mower(mower)) => tracing::info!(
                        lon = mower.position.lon,
                        lat = mower.position.lat,
                        heading = mower.heading,
                        areas,
                        "mower"
                    ),
                    _ => tracing::info!(areas, "waiting for pose"),
                }
            }
        }
    }

    sync.await??;
    Ok(())
}
