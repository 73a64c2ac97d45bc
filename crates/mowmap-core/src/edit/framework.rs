//! Base editing primitives shared by the edit modes: movement constraints,
//! whole-feature moves and the vertex/midpoint handles drawn on the canvas.

use std::collections::BTreeSet;

use crate::geo::{meter_in_degree, GeoDelta, GeoPoint};

use super::feature::{CoordPath, DrawFeature, DrawGeometry};
use super::host::DrawHost;

const LAT_MIN: f64 = -90.0;
const LAT_RENDERED_MIN: f64 = -85.0;
const LAT_MAX: f64 = 90.0;
const LAT_RENDERED_MAX: f64 = 85.0;
const LNG_MIN: f64 = -270.0;
const LNG_MAX: f64 = 270.0;

/// Constrain a drag delta so that every feature stays on the rendered globe.
///
/// Each slice is the coordinate set of one feature. Latitude is clamped to the
/// rendered band using the features' inner edges and to the poles using their
/// outer edges; longitude wraps by whole turns once a feature would leave
/// [-270, 270]. Returns `None` when the delta is not a finite number.
pub fn constrain_feature_movement(features: &[&[GeoPoint]], delta: GeoDelta) -> Option<GeoDelta> {
    if !delta.is_finite() {
        return None;
    }

    let mut north_inner = LAT_MIN;
    let mut south_inner = LAT_MAX;
    let mut north_outer = LAT_MIN;
    let mut south_outer = LAT_MAX;
    let mut west = LNG_MAX;
    let mut east = LNG_MIN;

    for coords in features {
        let Some(extent) = Extent::of(coords) else {
            continue;
        };
        north_inner = north_inner.max(extent.south);
        south_inner = south_inner.min(extent.north);
        north_outer = north_outer.max(extent.north);
        south_outer = south_outer.min(extent.south);
        west = west.min(extent.west);
        east = east.max(extent.east);
    }

    let mut constrained = delta;
    if north_inner + constrained.lat > LAT_RENDERED_MAX {
        constrained.lat = LAT_RENDERED_MAX - north_inner;
    }
    if north_outer + constrained.lat > LAT_MAX {
        constrained.lat = LAT_MAX - north_outer;
    }
    if south_inner + constrained.lat < LAT_RENDERED_MIN {
        constrained.lat = LAT_RENDERED_MIN - south_inner;
    }
    if south_outer + constrained.lat < LAT_MIN {
        constrained.lat = LAT_MIN - south_outer;
    }
    if west + constrained.lng <= LNG_MIN {
        constrained.lng += (constrained.lng.abs() / 360.0).ceil() * 360.0;
    }
    if east + constrained.lng >= LNG_MAX {
        constrained.lng -= (constrained.lng.abs() / 360.0).ceil() * 360.0;
    }
    Some(constrained)
}

struct Extent {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl Extent {
    fn of(coords: &[GeoPoint]) -> Option<Self> {
        let first = coords.first()?;
        let mut e = Extent {
            west: first.lon,
            south: first.lat,
            east: first.lon,
            north: first.lat,
        };
        for p in &coords[1..] {
            e.west = e.west.min(p.lon);
            e.east = e.east.max(p.lon);
            e.south = e.south.min(p.lat);
            e.north = e.north.max(p.lat);
        }
        Some(e)
    }
}

/// Translate every listed feature by one constrained delta.
///
/// Returns false without touching anything when the delta is rejected.
pub fn move_features<H: DrawHost + ?Sized>(host: &mut H, ids: &[String], delta: GeoDelta) -> bool {
    let coords: Vec<Vec<GeoPoint>> = ids
        .iter()
        .filter_map(|id| host.get_feature(id))
        .map(|f| f.vertices().into_iter().map(|(_, p)| p).collect())
        .collect();
    let slices: Vec<&[GeoPoint]> = coords.iter().map(Vec::as_slice).collect();
    let Some(constrained) = constrain_feature_movement(&slices, delta) else {
        return false;
    };

    for id in ids {
        if let Some(feature) = host.get_feature_mut(id) {
            feature.translate(constrained);
        }
    }
    true
}

// ========== SELF INTERSECTION ==========

/// True when two non-adjacent edges of the closed ring cross or touch.
///
/// The ring is projected to local meters around its first vertex.
pub fn ring_self_intersects(ring: &[GeoPoint]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }

    let origin = ring[0];
    let mid = meter_in_degree();
    let cos_lat = origin.lat.to_radians().cos();
    let local: Vec<(f64, f64)> = ring
        .iter()
        .map(|p| {
            (
                (p.lon - origin.lon) * cos_lat / mid,
                (p.lat - origin.lat) / mid,
            )
        })
        .collect();

    for i in 0..n {
        let a1 = local[i];
        let a2 = local[(i + 1) % n];
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let b1 = local[j];
            let b2 = local[(j + 1) % n];
            if segments_intersect_2d(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

/// Whether two ring edges, given in local meters east/north of the ring's
/// first vertex, touch or cross.
///
/// Touching counts: a vertex dragged onto a non-adjacent edge already makes
/// the ring degenerate. Orientations within a micrometer are treated as
/// collinear so vertices that round-trip through degrees still compare equal.
pub(crate) fn segments_intersect_2d(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    const COLLINEAR_M: f64 = 1e-6;

    // -1 clockwise, 0 collinear, 1 counter-clockwise.
    let side = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| -> i8 {
        let cross = (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0);
        if cross > COLLINEAR_M {
            1
        } else if cross < -COLLINEAR_M {
            -1
        } else {
            0
        }
    };
    // `r` lies inside the bounding box of edge `p`-`q`.
    let in_box = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| {
        (p.0.min(q.0) - COLLINEAR_M..=p.0.max(q.0) + COLLINEAR_M).contains(&r.0)
            && (p.1.min(q.1) - COLLINEAR_M..=p.1.max(q.1) + COLLINEAR_M).contains(&r.1)
    };

    let s1 = side(a1, a2, b1);
    let s2 = side(a1, a2, b2);
    let s3 = side(b1, b2, a1);
    let s4 = side(b1, b2, a2);

    if s1 * s2 < 0 && s3 * s4 < 0 {
        return true;
    }
    (s1 == 0 && in_box(a1, a2, b1))
        || (s2 == 0 && in_box(a1, a2, b2))
        || (s3 == 0 && in_box(b1, b2, a1))
        || (s4 == 0 && in_box(b1, b2, a2))
}

// ========== SUPPLEMENTARY POINTS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Vertex,
    Midpoint,
}

/// Handle drawn on top of the feature being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryPoint {
    pub kind: HandleKind,
    pub feature_id: String,
    /// For midpoints, the path a vertex inserted there would take.
    pub coord_path: CoordPath,
    pub position: GeoPoint,
    pub active: bool,
}

/// Vertex handles plus a midpoint handle on every edge.
pub fn supplementary_points(
    feature: &DrawFeature,
    selected: &BTreeSet<CoordPath>,
) -> Vec<SupplementaryPoint> {
    let mut out = Vec::new();
    let mut process = |vertices: &[GeoPoint], ring: Option<usize>, closed: bool| {
        let path = |i: usize| match ring {
            Some(r) => CoordPath::vertex(r, i),
            None => CoordPath::new(vec![i]),
        };
        let n = vertices.len();
        for (i, p) in vertices.iter().enumerate() {
            let coord_path = path(i);
            out.push(SupplementaryPoint {
                kind: HandleKind::Vertex,
                feature_id: feature.id.clone(),
                active: selected.contains(&coord_path),
                coord_path,
                position: *p,
            });
        }
        let edges = if closed && n >= 3 { n } else { n.saturating_sub(1) };
        for i in 0..edges {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            out.push(SupplementaryPoint {
                kind: HandleKind::Midpoint,
                feature_id: feature.id.clone(),
                coord_path: path(i + 1),
                position: GeoPoint::new((a.lon + b.lon) / 2.0, (a.lat + b.lat) / 2.0),
                active: false,
            });
        }
    };

    match &feature.geometry {
        DrawGeometry::Point(_) => {}
        DrawGeometry::LineString(line) => process(line, None, false),
        DrawGeometry::Polygon(rings) => {
            for (r, ring) in rings.iter().enumerate() {
                process(ring, Some(r), true);
            }
        }
    }
    out
}
