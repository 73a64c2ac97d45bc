//! Wire models for mower telemetry frames and map persistence requests.
//!
//! Telemetry frames are ROS messages marshalled with PascalCase field names;
//! persistence requests use the camelCase service schema.

use serde::{Deserialize, Serialize};

use crate::geo::PlanarPoint;

// ========== TELEMETRY FRAMES ==========

/// Go marshals nil slices as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Point32 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<Point32> for PlanarPoint {
    fn from(p: Point32) -> Self {
        PlanarPoint::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Polygon {
    #[serde(default, deserialize_with = "nullable")]
    pub points: Vec<Point32>,
}

impl Polygon {
    pub fn planar_ring(&self) -> Vec<PlanarPoint> {
        self.points.iter().map(|p| PlanarPoint::from(*p)).collect()
    }
}

/// A named area with its outer boundary and obstacles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapArea {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub area: Option<Polygon>,
    #[serde(default, deserialize_with = "nullable")]
    pub obstacles: Vec<Polygon>,
}

/// Map snapshot published on the `map` topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapSnapshot {
    #[serde(default)]
    pub map_width: f64,
    #[serde(default)]
    pub map_height: f64,
    #[serde(default)]
    pub map_center_x: f64,
    #[serde(default)]
    pub map_center_y: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub navigation_areas: Vec<MapArea>,
    #[serde(default, deserialize_with = "nullable")]
    pub working_area: Vec<MapArea>,
    #[serde(default)]
    pub dock_x: f64,
    #[serde(default)]
    pub dock_y: f64,
    #[serde(default)]
    pub dock_heading: f64,
}

impl MapSnapshot {
    /// Number of areas the backend currently stores.
    pub fn area_count(&self) -> usize {
        self.working_area.len() + self.navigation_areas.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub w: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pose {
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub orientation: Quaternion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoseWithCovariance {
    #[serde(default)]
    pub pose: Pose,
    #[serde(default, deserialize_with = "nullable")]
    pub covariance: Vec<f64>,
}

/// Fused absolute pose published on the `pose` topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AbsolutePose {
    #[serde(default)]
    pub sensor_stamp: u32,
    #[serde(default)]
    pub received_stamp: u32,
    #[serde(default)]
    pub source: u8,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub orientation_valid: u8,
    #[serde(default)]
    pub motion_vector_valid: u8,
    #[serde(default)]
    pub position_accuracy: f64,
    #[serde(default)]
    pub orientation_accuracy: f64,
    #[serde(default)]
    pub pose: PoseWithCovariance,
    #[serde(default)]
    pub motion_vector: Vector3,
    #[serde(default)]
    pub vehicle_heading: f64,
    /// Heading of motion in radians, counter-clockwise from east.
    #[serde(default)]
    pub motion_heading: f64,
}

impl AbsolutePose {
    pub fn planar_position(&self) -> PlanarPoint {
        let p = self.pose.pose.position;
        PlanarPoint::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoseStamped {
    #[serde(default)]
    pub pose: Pose,
}

/// Planned path published on the `plan` topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathFrame {
    #[serde(default, deserialize_with = "nullable")]
    pub poses: Vec<PoseStamped>,
}

// ========== PERSISTENCE REQUESTS ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<PlanarPoint> for PointMsg {
    fn from(p: PlanarPoint) -> Self {
        Self { x: p.x, y: p.y, z: 0.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonMsg {
    pub points: Vec<PointMsg>,
}

impl PolygonMsg {
    pub fn from_ring(ring: &[PlanarPoint]) -> Self {
        Self {
            points: ring.iter().map(|p| PointMsg::from(*p)).collect(),
        }
    }
}

/// Area payload accepted by the map service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAreaMsg {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub area: PolygonMsg,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<PolygonMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMowingAreaRequest {
    pub area: MapAreaMsg,
    pub is_navigation_area: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    pub orientation: QuaternionMsg,
    pub position: PointMsg,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDockingPointRequest {
    pub docking_pose: PoseMsg,
}

impl SetDockingPointRequest {
    /// Docking pose from a map snapshot, identity at the origin without one.
    pub fn from_snapshot(map: Option<&MapSnapshot>) -> Self {
        let docking_pose = match map {
            Some(map) => {
                let [x, y, z, w] = crate::geo::quaternion_from_heading(map.dock_heading);
                PoseMsg {
                    orientation: QuaternionMsg { x, y, z, w },
                    position: PointMsg {
                        x: map.dock_x,
                        y: map.dock_y,
                        z: 0.0,
                    },
                }
            }
            None => PoseMsg {
                orientation: QuaternionMsg {
                    w: 1.0,
                    ..Default::default()
                },
                position: PointMsg::default(),
            },
        };
        Self { docking_pose }
    }
}
