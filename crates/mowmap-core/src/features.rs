//! Map features built from telemetry frames.
//!
//! Every entity drawn on the map is a [`MapFeature`] variant. Features are
//! values: mutations return a new feature and the owner replaces the old
//! entry by id in its [`FeatureMap`].

use std::collections::BTreeMap;

use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::error::{MapError, Result};
use crate::geo::{heading_endpoint, Datum, GeoPoint, Offsets, PlanarPoint};
use crate::models::{
    AbsolutePose, AddMowingAreaRequest, MapAreaMsg, MapSnapshot, PathFrame, PolygonMsg,
};

pub const MOWER_ID: &str = "mower";
pub const MOWER_HEADING_ID: &str = "mower-heading";
pub const DOCK_ID: &str = "dock";
pub const PLAN_ID: &str = "plan";

pub const WORKING_AREA_PREFIX: &str = "area";
pub const NAVIGATION_PREFIX: &str = "navigation";

/// Minimum number of distinct vertices in a polygon ring.
pub const MIN_RING_VERTICES: usize = 3;

/// Length of the heading indicator drawn in front of the mower, in meters.
pub const DEFAULT_HEADING_LENGTH_M: f64 = 1.0;

pub mod colors {
    pub const MOWER: &str = "#00a6ff";
    pub const DOCK: &str = "#ff00f2";
    pub const HEADING: &str = "#ff0000";
    pub const PLAN: &str = "orange";
    pub const WORKING_AREA: &str = "#01d30d";
    pub const NAVIGATION: &str = "white";
    pub const OBSTACLE: &str = "#bf0000";
}

/// Features keyed by id.
pub type FeatureMap = BTreeMap<String, MapFeature>;

#[derive(Debug, Clone, PartialEq)]
pub struct MowerMarker {
    pub position: GeoPoint,
    /// Radians, counter-clockwise from east.
    pub heading: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: String,
    pub position: GeoPoint,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    pub id: String,
    pub coordinates: Vec<GeoPoint>,
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaFeature {
    pub id: String,
    /// Open ring (first vertex is not repeated).
    pub ring: Vec<GeoPoint>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingArea {
    pub id: String,
    pub ring: Vec<GeoPoint>,
    pub color: String,
    pub name: String,
    /// 1-based traversal position.
    pub mowing_order: u32,
}

impl WorkingArea {
    /// Index used when addressing the area in mower commands.
    pub fn index(&self) -> usize {
        self.mowing_order.saturating_sub(1) as usize
    }

    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("Area {}", self.mowing_order)
        } else {
            format!("{} ({})", self.name, self.mowing_order)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleArea {
    pub id: String,
    pub ring: Vec<GeoPoint>,
    pub color: String,
    /// Id of the owning working area.
    pub area_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Mower,
    Dock,
    Heading,
    Path,
    Navigation,
    WorkingArea,
    Obstacle,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Mower => "mower",
            FeatureKind::Dock => "dock",
            FeatureKind::Heading => "heading",
            FeatureKind::Path => "path",
            FeatureKind::Navigation => "navigation",
            FeatureKind::WorkingArea => "workarea",
            FeatureKind::Obstacle => "obstacle",
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(
            self,
            FeatureKind::Navigation | FeatureKind::WorkingArea | FeatureKind::Obstacle
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapFeature {
    Mower(MowerMarker),
    Dock(PointFeature),
    Heading(LineFeature),
    Path(LineFeature),
    Navigation(AreaFeature),
    WorkingArea(WorkingArea),
    Obstacle(ObstacleArea),
}

impl MapFeature {
    pub fn id(&self) -> &str {
        match self {
            MapFeature::Mower(_) => MOWER_ID,
            MapFeature::Dock(f) => &f.id,
            MapFeature::Heading(f) | MapFeature::Path(f) => &f.id,
            MapFeature::Navigation(f) => &f.id,
            MapFeature::WorkingArea(f) => &f.id,
            MapFeature::Obstacle(f) => &f.id,
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            MapFeature::Mower(_) => FeatureKind::Mower,
            MapFeature::Dock(_) => FeatureKind::Dock,
            MapFeature::Heading(_) => FeatureKind::Heading,
            MapFeature::Path(_) => FeatureKind::Path,
            MapFeature::Navigation(_) => FeatureKind::Navigation,
            MapFeature::WorkingArea(_) => FeatureKind::WorkingArea,
            MapFeature::Obstacle(_) => FeatureKind::Obstacle,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            MapFeature::Mower(f) => &f.color,
            MapFeature::Dock(f) => &f.color,
            MapFeature::Heading(f) | MapFeature::Path(f) => &f.color,
            MapFeature::Navigation(f) => &f.color,
            MapFeature::WorkingArea(f) => &f.color,
            MapFeature::Obstacle(f) => &f.color,
        }
    }

    /// Polygon ring for area variants.
    pub fn ring(&self) -> Option<&[GeoPoint]> {
        match self {
            MapFeature::Navigation(f) => Some(&f.ring),
            MapFeature::WorkingArea(f) => Some(&f.ring),
            MapFeature::Obstacle(f) => Some(&f.ring),
            _ => None,
        }
    }

    pub fn as_working_area(&self) -> Option<&WorkingArea> {
        match self {
            MapFeature::WorkingArea(area) => Some(area),
            _ => None,
        }
    }

    /// Copy of this feature with a replaced ring. Non-polygon features are
    /// returned unchanged.
    pub fn with_ring(&self, ring: Vec<GeoPoint>) -> MapFeature {
        match self {
            MapFeature::Navigation(f) => MapFeature::Navigation(AreaFeature {
                ring,
                ..f.clone()
            }),
            MapFeature::WorkingArea(f) => MapFeature::WorkingArea(WorkingArea {
                ring,
                ..f.clone()
            }),
            MapFeature::Obstacle(f) => MapFeature::Obstacle(ObstacleArea {
                ring,
                ..f.clone()
            }),
            other => other.clone(),
        }
    }

    pub fn with_color(&self, color: impl Into<String>) -> MapFeature {
        let color = color.into();
        match self {
            MapFeature::Mower(f) => MapFeature::Mower(MowerMarker {
                color,
                ..f.clone()
            }),
            MapFeature::Dock(f) => MapFeature::Dock(PointFeature {
                color,
                ..f.clone()
            }),
            MapFeature::Heading(f) => MapFeature::Heading(LineFeature {
                color,
                ..f.clone()
            }),
            MapFeature::Path(f) => MapFeature::Path(LineFeature {
                color,
                ..f.clone()
            }),
            MapFeature::Navigation(f) => MapFeature::Navigation(AreaFeature {
                color,
                ..f.clone()
            }),
            MapFeature::WorkingArea(f) => MapFeature::WorkingArea(WorkingArea {
                color,
                ..f.clone()
            }),
            MapFeature::Obstacle(f) => MapFeature::Obstacle(ObstacleArea {
                color,
                ..f.clone()
            }),
        }
    }

    /// Renamed copy of a working area; other variants are returned unchanged.
    pub fn with_name(&self, name: impl Into<String>) -> MapFeature {
        match self {
            MapFeature::WorkingArea(f) => MapFeature::WorkingArea(WorkingArea {
                name: name.into(),
                ..f.clone()
            }),
            other => other.clone(),
        }
    }

    pub fn to_geojson(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("id".into(), json!(self.id()));
        properties.insert("color".into(), json!(self.color()));
        properties.insert("feature_type".into(), json!(self.kind().as_str()));

        let value = match self {
            MapFeature::Mower(f) => {
                properties.insert("heading".into(), json!(f.heading));
                Value::Point(f.position.to_position())
            }
            MapFeature::Dock(f) => Value::Point(f.position.to_position()),
            MapFeature::Heading(f) | MapFeature::Path(f) => {
                properties.insert("width".into(), json!(f.width));
                Value::LineString(f.coordinates.iter().map(|p| p.to_position()).collect())
            }
            MapFeature::Navigation(f) => Value::Polygon(vec![closed_ring(&f.ring)]),
            MapFeature::WorkingArea(f) => {
                properties.insert("name".into(), json!(f.name));
                properties.insert("mowing_order".into(), json!(f.mowing_order));
                properties.insert("index".into(), json!(f.index()));
                Value::Polygon(vec![closed_ring(&f.ring)])
            }
            MapFeature::Obstacle(f) => {
                properties.insert("area_id".into(), json!(f.area_id));
                Value::Polygon(vec![closed_ring(&f.ring)])
            }
        };

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(value)),
            id: Some(Id::String(self.id().to_string())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

fn closed_ring(ring: &[GeoPoint]) -> Vec<Vec<f64>> {
    let mut positions: Vec<Vec<f64>> = ring.iter().map(|p| p.to_position()).collect();
    if let Some(first) = ring.first() {
        if ring.last() != Some(first) {
            positions.push(first.to_position());
        }
    }
    positions
}

/// Outer ring of a GeoJSON polygon with the closing vertex dropped.
pub fn ring_from_geojson(feature: &Feature) -> Option<Vec<GeoPoint>> {
    let geometry = feature.geometry.as_ref()?;
    let Value::Polygon(rings) = &geometry.value else {
        return None;
    };
    let outer = rings.first()?;
    let mut ring: Vec<GeoPoint> = outer
        .iter()
        .filter_map(|p| GeoPoint::from_position(p))
        .collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Some(ring)
}

pub fn feature_collection<'a>(features: impl IntoIterator<Item = &'a MapFeature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.into_iter().map(MapFeature::to_geojson).collect(),
        foreign_members: None,
    }
}

pub fn by_id(features: impl IntoIterator<Item = MapFeature>) -> FeatureMap {
    features
        .into_iter()
        .map(|f| (f.id().to_string(), f))
        .collect()
}

// ========== SNAPSHOT ==========

/// Build every polygon and the dock marker from a map snapshot.
///
/// Areas without points are skipped; working areas get a mowing order from
/// their position among the retained areas.
pub fn build_from_snapshot(
    map: &MapSnapshot,
    datum: &Datum,
    offsets: Offsets,
) -> Result<Vec<MapFeature>> {
    let mut features = Vec::new();
    let mut order = 0u32;

    for (index, area) in map.working_area.iter().enumerate() {
        let Some(polygon) = area.area.as_ref().filter(|p| !p.points.is_empty()) else {
            continue;
        };
        order += 1;
        let id = format!("{WORKING_AREA_PREFIX}-{index}");
        features.push(MapFeature::WorkingArea(WorkingArea {
            id: id.clone(),
            ring: datum.ring_to_geo(offsets, &polygon.planar_ring())?,
            color: colors::WORKING_AREA.to_string(),
            name: area.name.clone().unwrap_or_default(),
            mowing_order: order,
        }));

        for (oindex, obstacle) in area.obstacles.iter().enumerate() {
            if obstacle.points.is_empty() {
                continue;
            }
            features.push(MapFeature::Obstacle(ObstacleArea {
                id: format!("{id}-obstacle-{oindex}"),
                ring: datum.ring_to_geo(offsets, &obstacle.planar_ring())?,
                color: colors::OBSTACLE.to_string(),
                area_id: id.clone(),
            }));
        }
    }

    for (index, area) in map.navigation_areas.iter().enumerate() {
        let Some(polygon) = area.area.as_ref().filter(|p| !p.points.is_empty()) else {
            continue;
        };
        features.push(MapFeature::Navigation(AreaFeature {
            id: format!("{NAVIGATION_PREFIX}-{index}"),
            ring: datum.ring_to_geo(offsets, &polygon.planar_ring())?,
            color: colors::NAVIGATION.to_string(),
        }));
    }

    features.push(MapFeature::Dock(PointFeature {
        id: DOCK_ID.to_string(),
        position: datum.point_to_geo(offsets, PlanarPoint::new(map.dock_x, map.dock_y))?,
        color: colors::DOCK.to_string(),
    }));

    tracing::debug!(count = features.len(), "built features from map snapshot");
    Ok(features)
}

/// Replace the polygon and dock features of `current` with a new snapshot,
/// keeping live features (mower, heading, paths).
pub fn replace_snapshot(current: &FeatureMap, snapshot: Vec<MapFeature>) -> FeatureMap {
    let mut next: FeatureMap = current
        .iter()
        .filter(|(_, f)| {
            !f.kind().is_polygon() && f.kind() != FeatureKind::Dock
        })
        .map(|(id, f)| (id.clone(), f.clone()))
        .collect();
    next.extend(by_id(snapshot));
    next
}

/// South-west and north-east corners of the snapshot's extent.
pub fn map_bounds(map: &MapSnapshot, datum: &Datum, offsets: Offsets) -> Result<(GeoPoint, GeoPoint)> {
    let half_w = if map.map_width > 0.0 { map.map_width } else { 10.0 } / 2.0;
    let half_h = if map.map_height > 0.0 { map.map_height } else { 10.0 } / 2.0;
    let sw = datum.point_to_geo(
        offsets,
        PlanarPoint::new(map.map_center_x - half_w, map.map_center_y - half_h),
    )?;
    let ne = datum.point_to_geo(
        offsets,
        PlanarPoint::new(map.map_center_x + half_w, map.map_center_y + half_h),
    )?;
    Ok((sw, ne))
}

// ========== LIVE FEATURES ==========

/// Mower marker and heading indicator for a pose frame.
pub fn mower_features(
    pose: &AbsolutePose,
    datum: &Datum,
    offsets: Offsets,
    heading_length_m: f64,
) -> Result<[MapFeature; 2]> {
    let position = datum.point_to_geo(offsets, pose.planar_position())?;
    let tip = heading_endpoint(position, pose.motion_heading, heading_length_m);
    Ok([
        MapFeature::Mower(MowerMarker {
            position,
            heading: pose.motion_heading,
            color: colors::MOWER.to_string(),
        }),
        MapFeature::Heading(LineFeature {
            id: MOWER_HEADING_ID.to_string(),
            coordinates: vec![position, tip],
            color: colors::HEADING.to_string(),
            width: 1.0,
        }),
    ])
}

/// Copy of `features` with the mower marker and heading replaced.
pub fn upsert_mower_marker(
    features: &FeatureMap,
    pose: &AbsolutePose,
    datum: &Datum,
    offsets: Offsets,
) -> Result<FeatureMap> {
    let mut next = features.clone();
    for feature in mower_features(pose, datum, offsets, DEFAULT_HEADING_LENGTH_M)? {
        next.insert(feature.id().to_string(), feature);
    }
    Ok(next)
}

/// Planned path as a display line.
pub fn plan_feature(plan: &PathFrame, datum: &Datum, offsets: Offsets) -> Result<MapFeature> {
    let coordinates = plan
        .poses
        .iter()
        .map(|p| {
            let pos = p.pose.position;
            datum.point_to_geo(offsets, PlanarPoint::new(pos.x, pos.y))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MapFeature::Path(LineFeature {
        id: PLAN_ID.to_string(),
        coordinates,
        color: colors::PLAN.to_string(),
        width: 3.0,
    }))
}

// ========== SAVE PATH ==========

/// Planar ring of a polygon feature, for persistence only.
pub fn to_persistable_planar(
    feature: &MapFeature,
    datum: &Datum,
    offsets: Offsets,
) -> Result<Vec<PlanarPoint>> {
    let ring = feature.ring().ok_or_else(|| MapError::InvalidGeometry {
        feature_id: feature.id().to_string(),
        reason: format!("{} features have no polygon ring", feature.kind().as_str()),
    })?;
    if ring.len() < MIN_RING_VERTICES {
        return Err(MapError::InvalidGeometry {
            feature_id: feature.id().to_string(),
            reason: format!("ring has {} vertices", ring.len()),
        });
    }
    datum.ring_to_planar(offsets, ring)
}

/// Ordered list of area submissions for a full-replace save.
///
/// Working areas come first in mowing order, each carrying its obstacles,
/// followed by the navigation areas.
pub fn build_save_plan(
    features: &FeatureMap,
    datum: &Datum,
    offsets: Offsets,
) -> Result<Vec<AddMowingAreaRequest>> {
    let mut working: Vec<&WorkingArea> = features
        .values()
        .filter_map(MapFeature::as_working_area)
        .collect();
    working.sort_by_key(|a| a.mowing_order);

    for feature in features.values() {
        if let MapFeature::Obstacle(obstacle) = feature {
            if !matches!(features.get(&obstacle.area_id), Some(MapFeature::WorkingArea(_))) {
                return Err(MapError::UnknownFeature(obstacle.area_id.clone()));
            }
        }
    }

    let mut plan = Vec::new();
    for area in working {
        let feature = &features[&area.id];
        let mut obstacles = Vec::new();
        for obstacle in obstacles_of(features, &area.id) {
            obstacles.push(PolygonMsg::from_ring(&to_persistable_planar(
                obstacle, datum, offsets,
            )?));
        }
        plan.push(AddMowingAreaRequest {
            area: MapAreaMsg {
                name: area.name.clone(),
                area: PolygonMsg::from_ring(&to_persistable_planar(feature, datum, offsets)?),
                obstacles,
            },
            is_navigation_area: false,
        });
    }

    for feature in features.values() {
        if feature.kind() == FeatureKind::Navigation {
            plan.push(AddMowingAreaRequest {
                area: MapAreaMsg {
                    name: String::new(),
                    area: PolygonMsg::from_ring(&to_persistable_planar(feature, datum, offsets)?),
                    obstacles: Vec::new(),
                },
                is_navigation_area: true,
            });
        }
    }

    Ok(plan)
}

pub fn obstacles_of<'a>(features: &'a FeatureMap, area_id: &'a str) -> impl Iterator<Item = &'a MapFeature> + 'a {
    features
        .values()
        .filter(move |f| matches!(f, MapFeature::Obstacle(o) if o.area_id == area_id))
}

// ========== AREA CREATION ==========

fn numeric_suffix<'a>(id: &'a str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

/// Next `<prefix>-<n>` id, one above the highest existing suffix.
///
/// Ids with extra components (obstacles) are ignored.
pub fn next_feature_id<'a>(ids: impl IntoIterator<Item = &'a str>, prefix: &str) -> String {
    let next = ids
        .into_iter()
        .filter_map(|id| numeric_suffix(id, prefix))
        .max()
        .map(|max| max + 1)
        .unwrap_or(0);
    format!("{prefix}-{next}")
}

pub fn next_obstacle_id(features: &FeatureMap, area_id: &str) -> String {
    next_feature_id(features.keys().map(String::as_str), &format!("{area_id}-obstacle"))
}

/// Drawn polygon promoted to a working area at the end of the mowing order.
pub fn create_working_area(features: &FeatureMap, ring: Vec<GeoPoint>) -> Result<MapFeature> {
    validate_ring("new working area", &ring)?;
    let id = next_feature_id(features.keys().map(String::as_str), WORKING_AREA_PREFIX);
    let count = features
        .values()
        .filter(|f| f.kind() == FeatureKind::WorkingArea)
        .count() as u32;
    Ok(MapFeature::WorkingArea(WorkingArea {
        id,
        ring,
        color: colors::WORKING_AREA.to_string(),
        name: String::new(),
        mowing_order: count + 1,
    }))
}

pub fn create_navigation_area(features: &FeatureMap, ring: Vec<GeoPoint>) -> Result<MapFeature> {
    validate_ring("new navigation area", &ring)?;
    Ok(MapFeature::Navigation(AreaFeature {
        id: next_feature_id(features.keys().map(String::as_str), NAVIGATION_PREFIX),
        ring,
        color: colors::NAVIGATION.to_string(),
    }))
}

/// Drawn polygon attached as an obstacle to the working area containing it.
pub fn create_obstacle(features: &FeatureMap, ring: Vec<GeoPoint>) -> Result<MapFeature> {
    validate_ring("new obstacle", &ring)?;
    let probe = ring[0];
    let area = features
        .values()
        .filter_map(MapFeature::as_working_area)
        .find(|area| ring_contains(&area.ring, probe))
        .ok_or(MapError::ObstacleOutsideArea)?;
    Ok(MapFeature::Obstacle(ObstacleArea {
        id: next_obstacle_id(features, &area.id),
        ring,
        color: colors::OBSTACLE.to_string(),
        area_id: area.id.clone(),
    }))
}

fn validate_ring(what: &str, ring: &[GeoPoint]) -> Result<()> {
    if ring.len() < MIN_RING_VERTICES {
        return Err(MapError::InvalidGeometry {
            feature_id: what.to_string(),
            reason: format!("ring has {} vertices", ring.len()),
        });
    }
    Ok(())
}

/// Ray casting point-in-polygon test in lon/lat space.
pub fn ring_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    let n = ring.len();
    if n < MIN_RING_VERTICES {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i].lon, ring[i].lat);
        let (xj, yj) = (ring[j].lon, ring[j].lat);
        if ((yi > point.lat) != (yj > point.lat))
            && (point.lon < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Remove a feature. Removing a working area also removes its obstacles.
pub fn remove_feature(features: &FeatureMap, id: &str) -> FeatureMap {
    features
        .iter()
        .filter(|(fid, f)| {
            fid.as_str() != id && !matches!(f, MapFeature::Obstacle(o) if o.area_id == id)
        })
        .map(|(fid, f)| (fid.clone(), f.clone()))
        .collect()
}

// ========== MOWING ORDER ==========

/// Pending change to a working area's name and order.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaEdit {
    pub id: String,
    pub name: String,
    pub mowing_order: u32,
    pub orig_mowing_order: u32,
}

/// Renumber working areas 1..N by their current order.
///
/// Duplicate orders keep their id order unless `edited` names the area that
/// caused the tie: an area moved later sorts after its peers, an area moved
/// earlier sorts before them.
pub fn renumber_mowing_order(features: &FeatureMap, edited: Option<&AreaEdit>) -> FeatureMap {
    let mut areas: Vec<&WorkingArea> = features
        .values()
        .filter_map(MapFeature::as_working_area)
        .collect();

    let tiebreak = |area: &WorkingArea| -> i8 {
        match edited {
            Some(edit) if edit.id == area.id => {
                if edit.orig_mowing_order < edit.mowing_order {
                    1
                } else if edit.orig_mowing_order > edit.mowing_order {
                    -1
                } else {
                    0
                }
            }
            _ => 0,
        }
    };
    areas.sort_by_key(|a| (a.mowing_order, tiebreak(a)));

    let mut next = features.clone();
    for (i, area) in areas.into_iter().enumerate() {
        let renumbered = MapFeature::WorkingArea(WorkingArea {
            mowing_order: i as u32 + 1,
            ..area.clone()
        });
        next.insert(area.id.clone(), renumbered);
    }
    next
}

/// Apply a name/order edit and renumber the working areas.
pub fn apply_area_edit(features: &FeatureMap, edit: &AreaEdit) -> Result<FeatureMap> {
    let area = features
        .get(&edit.id)
        .and_then(MapFeature::as_working_area)
        .ok_or_else(|| MapError::UnknownFeature(edit.id.clone()))?;

    let mut next = features.clone();
    let updated = WorkingArea {
        name: edit.name.clone(),
        mowing_order: edit.mowing_order,
        ..area.clone()
    };
    next.insert(edit.id.clone(), MapFeature::WorkingArea(updated));

    if edit.mowing_order != edit.orig_mowing_order {
        next = renumber_mowing_order(&next, Some(edit));
    }
    Ok(next)
}

// ========== LABELS ==========

#[derive(Debug, Clone, PartialEq)]
pub struct AreaLabel {
    pub id: String,
    pub title: String,
    pub index: usize,
    pub position: GeoPoint,
}

/// Mean of the ring's vertices.
pub fn centroid(ring: &[GeoPoint]) -> Option<GeoPoint> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (lon, lat) = ring
        .iter()
        .fold((0.0, 0.0), |(lon, lat), p| (lon + p.lon, lat + p.lat));
    Some(GeoPoint::new(lon / n, lat / n))
}

/// Labels for every working area, sorted by mowing order.
pub fn area_labels(features: &FeatureMap) -> Vec<AreaLabel> {
    let mut labels: Vec<AreaLabel> = features
        .values()
        .filter_map(MapFeature::as_working_area)
        .filter_map(|area| {
            Some(AreaLabel {
                id: area.id.clone(),
                title: area.label(),
                index: area.index(),
                position: centroid(&area.ring)?,
            })
        })
        .collect();
    labels.sort_by_key(|l| l.index);
    labels
}

// ========== EDITOR UPDATES ==========

/// Id of an editor update payload.
pub fn update_id(update: &Feature) -> Option<&str> {
    match update.id.as_ref() {
        Some(Id::String(id)) => Some(id),
        _ => None,
    }
}

/// `existing` with the ring of an edited GeoJSON polygon, or None when the
/// update does not apply to it.
pub fn apply_geometry_update(existing: &MapFeature, update: &Feature) -> Option<MapFeature> {
    if !existing.kind().is_polygon() {
        return None;
    }
    ring_from_geojson(update).map(|ring| existing.with_ring(ring))
}
