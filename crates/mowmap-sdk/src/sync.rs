//! Live map synchronisation: telemetry streams in, full-replace saves out.

use std::env;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::sync::broadcast;

use mowmap_core::features::{
    self, apply_geometry_update, build_from_snapshot, build_save_plan, mower_features,
    plan_feature, update_id, FeatureKind, FeatureMap, MapFeature,
};
use mowmap_core::geo::{Datum, GeoPoint, Offsets};
use mowmap_core::models::{AbsolutePose, MapSnapshot, PathFrame, SetDockingPointRequest};
use mowmap_core::MapError;

use crate::client::MowerClient;
use crate::notify::Notifier;
use crate::stream::Topic;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub heading_length_m: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4006".to_string(),
            request_timeout: Duration::from_secs(10),
            heading_length_m: features::DEFAULT_HEADING_LENGTH_M,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("MOWMAP_URL").unwrap_or(defaults.base_url),
            request_timeout: env::var("MOWMAP_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            heading_length_m: env::var("MOWMAP_HEADING_LENGTH_M")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.heading_length_m),
        }
    }
}

/// Save aborted part way; the backend map is left as the counters describe.
#[derive(Debug, thiserror::Error)]
#[error("map save failed after {completed_adds} adds and {completed_deletes} deletes: {source}")]
pub struct SaveError {
    pub completed_adds: usize,
    pub completed_deletes: usize,
    pub source: anyhow::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub added: usize,
    pub deleted: usize,
}

/// Owns the live feature store for one backend.
pub struct MapSyncService {
    client: MowerClient,
    config: SyncConfig,
    datum: Datum,
    offsets: Mutex<Offsets>,
    features: DashMap<String, MapFeature>,
    snapshot: Mutex<Option<MapSnapshot>>,
    notifier: Notifier,
}

impl MapSyncService {
    pub fn new(client: MowerClient, config: SyncConfig, datum: Datum, offsets: Offsets) -> Self {
        Self {
            client,
            config,
            datum,
            offsets: Mutex::new(offsets),
            features: DashMap::new(),
            snapshot: Mutex::new(None),
            notifier: Notifier::default(),
        }
    }

    /// Read datum and offsets from the backend.
    ///
    /// Fails with [`mowmap_core::MapError::NotReady`] while the datum is unset.
    pub async fn connect(config: SyncConfig) -> Result<Self> {
        let client = MowerClient::new(&config.base_url, config.request_timeout)?;
        let datum = client
            .datum()
            .await
            .context("map datum is not available")?;

        let notifier = Notifier::default();
        let offsets = match client.offsets().await {
            Ok(offsets) => offsets,
            Err(e) => {
                notifier.error("Failed to load config", format!("{e:#}"));
                Offsets::default()
            }
        };
        tracing::info!(
            zone = %datum.zone_label(),
            offset_x = offsets.x,
            offset_y = offsets.y,
            "map sync ready"
        );

        let mut service = Self::new(client, config, datum, offsets);
        service.notifier = notifier;
        Ok(service)
    }

    pub fn client(&self) -> &MowerClient {
        &self.client
    }

    pub fn datum(&self) -> &Datum {
        &self.datum
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn offsets(&self) -> Offsets {
        self.offsets.lock().map(|o| *o).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<MapSnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }

    pub fn feature(&self, id: &str) -> Option<MapFeature> {
        self.features.get(id).map(|f| f.value().clone())
    }

    /// Copy of the live store.
    pub fn features(&self) -> FeatureMap {
        self.features
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    // ========== FRAME HANDLING ==========

    pub fn apply_pose(&self, pose: &AbsolutePose) -> mowmap_core::Result<()> {
        let offsets = self.offsets();
        for feature in mower_features(pose, &self.datum, offsets, self.config.heading_length_m)? {
            self.features.insert(feature.id().to_string(), feature);
        }
        Ok(())
    }

    /// Replace every polygon and the dock with a new snapshot.
    pub fn apply_map(&self, map: MapSnapshot) -> mowmap_core::Result<()> {
        let built = build_from_snapshot(&map, &self.datum, self.offsets())?;
        self.replace_map_features(built);
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = Some(map);
        }
        Ok(())
    }

    pub fn apply_plan(&self, plan: &PathFrame) -> mowmap_core::Result<()> {
        let feature = plan_feature(plan, &self.datum, self.offsets())?;
        self.features.insert(feature.id().to_string(), feature);
        Ok(())
    }

    /// Install edited map features, keeping mower, heading and paths.
    pub fn replace_features(&self, features: FeatureMap) {
        self.replace_map_features(
            features
                .into_values()
                .filter(|f| f.kind().is_polygon() || f.kind() == FeatureKind::Dock),
        );
    }

    /// Apply "feature updated" payloads from an edit session.
    ///
    /// Each named feature is patched in place; entries the payload does not
    /// name are never written.
    pub fn apply_editor_update(&self, updates: &[geojson::Feature]) {
        for update in updates {
            let Some(id) = update_id(update) else {
                continue;
            };
            match self.features.get_mut(id) {
                Some(mut entry) => {
                    if let Some(replaced) = apply_geometry_update(entry.value(), update) {
                        *entry = replaced;
                    }
                }
                None => tracing::warn!(%id, "update for unknown feature ignored"),
            }
        }
    }

    fn replace_map_features(&self, features: impl IntoIterator<Item = MapFeature>) {
        self.features
            .retain(|_, f| !f.kind().is_polygon() && f.kind() != FeatureKind::Dock);
        for feature in features {
            self.features.insert(feature.id().to_string(), feature);
        }
    }

    /// New offsets: persisted to the backend, then every feature is rebuilt.
    pub async fn set_offsets(&self, offsets: Offsets) -> Result<()> {
        if let Err(e) = self.client.set_offsets(offsets).await {
            self.notifier.error("Failed to save config", format!("{e:#}"));
            return Err(e);
        }
        if let Ok(mut current) = self.offsets.lock() {
            *current = offsets;
        }
        if let Some(map) = self.snapshot() {
            self.apply_map(map)?;
        }
        Ok(())
    }

    /// South-west and north-east corners of the current map.
    pub fn map_bounds(&self) -> Option<(GeoPoint, GeoPoint)> {
        let map = self.snapshot()?;
        features::map_bounds(&map, &self.datum, self.offsets()).ok()
    }

    /// Fetch one map frame and apply it.
    pub async fn refresh_map(&self) -> Result<()> {
        let mut stream = self.client.subscribe(Topic::Map).await?;
        let map: MapSnapshot = stream
            .next_frame()
            .await?
            .context("map stream closed before the first frame")?;
        stream.close().await.ok();
        self.apply_map(map)?;
        Ok(())
    }

    // ========== SAVE ==========

    /// Replace the backend map with `features`.
    pub async fn save(&self, features: &FeatureMap) -> Result<SaveReport, SaveError> {
        let dock_source = self.snapshot();
        self.save_with_dock(features, dock_source.as_ref()).await
    }

    /// Add every area of `features`, delete every area the backend held
    /// before, then set the docking pose from `dock_source`.
    ///
    /// Fails with `NotReady` before any map snapshot has been applied. The
    /// first failing request aborts the sequence; nothing is rolled back.
    pub async fn save_with_dock(
        &self,
        features: &FeatureMap,
        dock_source: Option<&MapSnapshot>,
    ) -> Result<SaveReport, SaveError> {
        let result = self.run_save(features, dock_source).await;
        match &result {
            Ok(report) => {
                tracing::info!(added = report.added, deleted = report.deleted, "map saved");
                self.notifier.success("Area saved");
            }
            Err(e) => self.notifier.error("Failed to save area", e.to_string()),
        }
        result
    }

    async fn run_save(
        &self,
        features: &FeatureMap,
        dock_source: Option<&MapSnapshot>,
    ) -> Result<SaveReport, SaveError> {
        let fail = |adds: usize, deletes: usize| {
            move |source: anyhow::Error| SaveError {
                completed_adds: adds,
                completed_deletes: deletes,
                source,
            }
        };

        // Without a snapshot the old indices are unknown and nothing would be
        // deleted, leaving the previous areas next to the new ones.
        let Some(existing) = self.snapshot().map(|m| m.area_count()) else {
            let not_ready = MapError::NotReady("no map snapshot received yet".into());
            return Err(fail(0, 0)(not_ready.into()));
        };
        let plan = build_save_plan(features, &self.datum, self.offsets())
            .map_err(|e| fail(0, 0)(e.into()))?;

        for (done, request) in plan.iter().enumerate() {
            tracing::debug!(name = %request.area.name, navigation = request.is_navigation_area, "adding area");
            self.client.add_area(request).await.map_err(fail(done, 0))?;
        }

        // Added areas are appended, so the old ones keep indices 0..existing.
        for (done, index) in (0..existing).rev().enumerate() {
            tracing::debug!(index, "deleting area");
            self.client
                .delete_area(index)
                .await
                .map_err(fail(plan.len(), done))?;
        }

        let dock = SetDockingPointRequest::from_snapshot(dock_source);
        self.client
            .set_docking_point(&dock)
            .await
            .map_err(fail(plan.len(), existing))?;

        Ok(SaveReport {
            added: plan.len(),
            deleted: existing,
        })
    }

    // ========== STREAMING ==========

    /// Apply pose, map and plan frames until shutdown or a stream ends.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut pose = self.client.subscribe(Topic::Pose).await?;
        let mut map = self.client.subscribe(Topic::Map).await?;
        let mut plan = self.client.subscribe(Topic::Plan).await?;
        self.notifier.info("Stream connected");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("map sync shutting down");
                    break;
                }
                frame = pose.next_frame::<AbsolutePose>() => match frame {
                    Ok(Some(frame)) => {
                        if let Err(e) = self.apply_pose(&frame) {
                            tracing::warn!("dropping pose frame: {}", e);
                        }
                    }
                    other => {
                        self.stream_ended(Topic::Pose, other.err());
                        break;
                    }
                },
                frame = map.next_frame::<MapSnapshot>() => match frame {
                    Ok(Some(frame)) => {
                        tracing::debug!(areas = frame.area_count(), "map frame");
                        if let Err(e) = self.apply_map(frame) {
                            tracing::warn!("dropping map frame: {}", e);
                        }
                    }
                    other => {
                        self.stream_ended(Topic::Map, other.err());
                        break;
                    }
                },
                frame = plan.next_frame::<PathFrame>() => match frame {
                    Ok(Some(frame)) => {
                        if let Err(e) = self.apply_plan(&frame) {
                            tracing::warn!("dropping plan frame: {}", e);
                        }
                    }
                    other => {
                        self.stream_ended(Topic::Plan, other.err());
                        break;
                    }
                },
            }
        }

        for stream in [pose, map, plan] {
            stream.close().await.ok();
        }
        Ok(())
    }

    fn stream_ended(&self, topic: Topic, error: Option<anyhow::Error>) {
        match error {
            Some(e) => self.notifier.error("Stream error", format!("{topic}: {e:#}")),
            None => self.notifier.error("Stream closed", topic.to_string()),
        }
    }
}
