//! Editable geometry addressed by coordinate paths.

use std::fmt;
use std::str::FromStr;

use geojson::{feature::Id, Feature, Geometry, JsonObject, Value};

use crate::error::{MapError, Result};
use crate::features::MIN_RING_VERTICES;
use crate::geo::{GeoDelta, GeoPoint};

/// Address of a vertex inside a geometry: `"2"` for the third vertex of a
/// line, `"0.3"` for the fourth vertex of the outer ring of a polygon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordPath(Vec<usize>);

impl CoordPath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn vertex(ring: usize, index: usize) -> Self {
        Self(vec![ring, index])
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for CoordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for CoordPath {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self(Vec::new()));
        }
        s.split('.')
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| MapError::InvalidId(format!("bad coordinate path {s:?}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawGeometry {
    Point(GeoPoint),
    LineString(Vec<GeoPoint>),
    /// Rings are stored open.
    Polygon(Vec<Vec<GeoPoint>>),
}

/// Feature as held by the editing host.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawFeature {
    pub id: String,
    pub geometry: DrawGeometry,
    pub properties: JsonObject,
}

impl DrawFeature {
    pub fn new(id: impl Into<String>, geometry: DrawGeometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: JsonObject::new(),
        }
    }

    pub fn from_geojson(feature: &Feature) -> Result<Self> {
        let id = match &feature.id {
            Some(Id::String(id)) => id.clone(),
            Some(Id::Number(n)) => n.to_string(),
            None => return Err(MapError::InvalidId("feature without id".into())),
        };
        let value = feature
            .geometry
            .as_ref()
            .map(|g| &g.value)
            .ok_or_else(|| MapError::InvalidGeometry {
                feature_id: id.clone(),
                reason: "missing geometry".into(),
            })?;

        let point = |p: &Vec<f64>| {
            GeoPoint::from_position(p).ok_or_else(|| MapError::InvalidGeometry {
                feature_id: id.clone(),
                reason: "position needs two components".into(),
            })
        };

        let geometry = match value {
            Value::Point(p) => DrawGeometry::Point(point(p)?),
            Value::LineString(line) => {
                DrawGeometry::LineString(line.iter().map(point).collect::<Result<_>>()?)
            }
            Value::Polygon(rings) => {
                let mut open = Vec::with_capacity(rings.len());
                for ring in rings {
                    let mut ring: Vec<GeoPoint> = ring.iter().map(point).collect::<Result<_>>()?;
                    if ring.len() > 1 && ring.first() == ring.last() {
                        ring.pop();
                    }
                    open.push(ring);
                }
                DrawGeometry::Polygon(open)
            }
            _ => {
                return Err(MapError::InvalidGeometry {
                    feature_id: id,
                    reason: "unsupported geometry type".into(),
                })
            }
        };

        Ok(Self {
            id,
            geometry,
            properties: feature.properties.clone().unwrap_or_default(),
        })
    }

    pub fn to_geojson(&self) -> Feature {
        let value = match &self.geometry {
            DrawGeometry::Point(p) => Value::Point(p.to_position()),
            DrawGeometry::LineString(line) => {
                Value::LineString(line.iter().map(|p| p.to_position()).collect())
            }
            DrawGeometry::Polygon(rings) => Value::Polygon(
                rings
                    .iter()
                    .map(|ring| {
                        let mut closed: Vec<Vec<f64>> =
                            ring.iter().map(|p| p.to_position()).collect();
                        if let Some(first) = ring.first() {
                            closed.push(first.to_position());
                        }
                        closed
                    })
                    .collect(),
            ),
        };
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(value)),
            id: Some(Id::String(self.id.clone())),
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self.geometry, DrawGeometry::Point(_))
    }

    /// Lines need two vertices, every polygon ring needs three.
    pub fn is_valid(&self) -> bool {
        match &self.geometry {
            DrawGeometry::Point(p) => p.lon.is_finite() && p.lat.is_finite(),
            DrawGeometry::LineString(line) => line.len() > 1,
            DrawGeometry::Polygon(rings) => {
                !rings.is_empty() && rings.iter().all(|r| r.len() >= MIN_RING_VERTICES)
            }
        }
    }

    pub fn get_coordinate(&self, path: &CoordPath) -> Option<GeoPoint> {
        match (&self.geometry, path.indices()) {
            (DrawGeometry::Point(p), []) => Some(*p),
            (DrawGeometry::LineString(line), [i]) => line.get(*i).copied(),
            (DrawGeometry::Polygon(rings), [r, i]) => rings.get(*r)?.get(*i).copied(),
            _ => None,
        }
    }

    fn coordinate_mut(&mut self, path: &CoordPath) -> Option<&mut GeoPoint> {
        match (&mut self.geometry, path.indices()) {
            (DrawGeometry::Point(p), []) => Some(p),
            (DrawGeometry::LineString(line), [i]) => line.get_mut(*i),
            (DrawGeometry::Polygon(rings), [r, i]) => rings.get_mut(*r)?.get_mut(*i),
            _ => None,
        }
    }

    /// Returns false when the path does not address a vertex.
    pub fn update_coordinate(&mut self, path: &CoordPath, point: GeoPoint) -> bool {
        match self.coordinate_mut(path) {
            Some(slot) => {
                *slot = point;
                true
            }
            None => false,
        }
    }

    /// Insert a vertex so that it ends up at `path`.
    pub fn add_coordinate(&mut self, path: &CoordPath, point: GeoPoint) -> bool {
        let target = match (&mut self.geometry, path.indices()) {
            (DrawGeometry::LineString(line), [i]) => Some((line, *i)),
            (DrawGeometry::Polygon(rings), [r, i]) => rings.get_mut(*r).map(|ring| (ring, *i)),
            _ => None,
        };
        match target {
            Some((vertices, index)) if index <= vertices.len() => {
                vertices.insert(index, point);
                true
            }
            _ => false,
        }
    }

    pub fn remove_coordinate(&mut self, path: &CoordPath) -> bool {
        let target = match (&mut self.geometry, path.indices()) {
            (DrawGeometry::LineString(line), [i]) => Some((line, *i)),
            (DrawGeometry::Polygon(rings), [r, i]) => rings.get_mut(*r).map(|ring| (ring, *i)),
            _ => None,
        };
        match target {
            Some((vertices, index)) if index < vertices.len() => {
                vertices.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Every vertex with its path, in ring order.
    pub fn vertices(&self) -> Vec<(CoordPath, GeoPoint)> {
        match &self.geometry {
            DrawGeometry::Point(p) => vec![(CoordPath::new(Vec::new()), *p)],
            DrawGeometry::LineString(line) => line
                .iter()
                .enumerate()
                .map(|(i, p)| (CoordPath::new(vec![i]), *p))
                .collect(),
            DrawGeometry::Polygon(rings) => rings
                .iter()
                .enumerate()
                .flat_map(|(r, ring)| {
                    ring.iter()
                        .enumerate()
                        .map(move |(i, p)| (CoordPath::vertex(r, i), *p))
                })
                .collect(),
        }
    }

    pub fn translate(&mut self, delta: GeoDelta) {
        match &mut self.geometry {
            DrawGeometry::Point(p) => *p = p.offset(delta),
            DrawGeometry::LineString(line) => line.iter_mut().for_each(|p| *p = p.offset(delta)),
            DrawGeometry::Polygon(rings) => rings
                .iter_mut()
                .flatten()
                .for_each(|p| *p = p.offset(delta)),
        }
    }

    /// Ring containing `path`, for polygon features.
    pub fn ring_of(&self, path: &CoordPath) -> Option<&[GeoPoint]> {
        match (&self.geometry, path.indices()) {
            (DrawGeometry::Polygon(rings), [r, _]) => rings.get(*r).map(Vec::as_slice),
            (DrawGeometry::LineString(line), [_]) => Some(line.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> DrawFeature {
        DrawFeature::new(
            "area-0",
            DrawGeometry::Polygon(vec![vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(1.0, 0.0),
                GeoPoint::new(1.0, 1.0),
            ]]),
        )
    }

    #[test]
    fn coord_paths_parse_and_order_numerically() {
        let a: CoordPath = "0.10".parse().unwrap();
        let b: CoordPath = "0.9".parse().unwrap();
        assert!(a > b);
        assert_eq!(a.to_string(), "0.10");
        assert!("0.x".parse::<CoordPath>().is_err());
    }

    #[test]
    fn add_and_remove_keep_validity_in_sync() {
        let mut f = triangle();
        assert!(f.add_coordinate(&CoordPath::vertex(0, 1), GeoPoint::new(0.5, -0.1)));
        assert_eq!(f.get_coordinate(&CoordPath::vertex(0, 1)), Some(GeoPoint::new(0.5, -0.1)));
        assert_eq!(f.vertices().len(), 4);

        assert!(f.remove_coordinate(&CoordPath::vertex(0, 3)));
        assert!(f.remove_coordinate(&CoordPath::vertex(0, 2)));
        assert!(!f.is_valid());
        assert!(!f.remove_coordinate(&CoordPath::vertex(0, 7)));
    }

    #[test]
    fn geojson_rings_are_closed_on_output_and_opened_on_input() {
        let f = triangle();
        let geo = f.to_geojson();
        match geo.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Polygon(rings)) => assert_eq!(rings[0].len(), 4),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(DrawFeature::from_geojson(&geo).unwrap(), f);
    }

    #[test]
    fn features_without_id_are_rejected() {
        let mut geo = triangle().to_geojson();
        geo.id = None;
        assert!(matches!(DrawFeature::from_geojson(&geo), Err(MapError::InvalidId(_))));
    }
}
