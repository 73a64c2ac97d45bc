//! Direct-select editing of a single polygon with multi-vertex box selection.
//!
//! An [`EditSession`] is created when the operator enters edit mode on a
//! feature and consumed when they leave it. The host canvas forwards pointer
//! events to the session's `on_*` methods and supplies the [`DrawHost`]
//! capabilities the session acts through.

pub mod feature;
pub mod framework;
pub mod host;

use std::collections::BTreeSet;

use crate::error::{MapError, Result};
use crate::geo::{GeoDelta, GeoPoint};

pub use feature::{CoordPath, DrawFeature, DrawGeometry};
pub use framework::{
    constrain_feature_movement, move_features, ring_self_intersects, supplementary_points,
    HandleKind, SupplementaryPoint,
};
pub use host::{Cursor, DrawHost, HostMode, MemoryDrawHost, ScreenBox, ScreenPoint, Viewport};

/// What sits under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    None,
    /// Body of a feature.
    Feature { id: String },
    Vertex { feature_id: String, path: CoordPath },
    Midpoint {
        feature_id: String,
        path: CoordPath,
        position: GeoPoint,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub lng_lat: GeoPoint,
    pub point: ScreenPoint,
    pub shift: bool,
    pub target: PointerTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    Feature,
    Vertices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    FeatureSelected,
    VertexSelected,
    Dragging(DragTarget),
    BoxSelecting,
}

#[derive(Debug, Clone, Copy)]
struct BoxSelect {
    start: ScreenPoint,
    current: ScreenPoint,
}

impl BoxSelect {
    fn rect(&self) -> ScreenBox {
        ScreenBox::from_corners(self.start, self.current)
    }
}

#[derive(Debug, Clone)]
pub struct EditSession {
    feature_id: String,
    selected: BTreeSet<CoordPath>,
    can_drag_move: bool,
    drag_moving: bool,
    drag_location: Option<GeoPoint>,
    box_select: Option<BoxSelect>,
    active: bool,
}

impl EditSession {
    /// Enter edit mode on `feature_id`, optionally with one vertex selected.
    ///
    /// Point features and unknown ids are rejected before any state exists.
    pub fn enter<H: DrawHost + ?Sized>(
        host: &mut H,
        feature_id: &str,
        coord_path: Option<CoordPath>,
    ) -> Result<Self> {
        if feature_id.is_empty() {
            return Err(MapError::InvalidModeEntry("a feature id is required".into()));
        }
        let feature = host
            .get_feature(feature_id)
            .ok_or_else(|| MapError::UnknownFeature(feature_id.to_string()))?;
        if feature.is_point() {
            return Err(MapError::InvalidModeEntry(format!(
                "{feature_id} is a point feature and has no vertices to edit"
            )));
        }

        let selected: BTreeSet<CoordPath> = coord_path
            .into_iter()
            .filter(|p| feature.get_coordinate(p).is_some())
            .collect();

        host.set_selected(&[feature_id.to_string()]);
        host.set_double_click_zoom(false);
        tracing::debug!(feature_id, "entered direct select");

        Ok(Self {
            feature_id: feature_id.to_string(),
            selected,
            can_drag_move: false,
            drag_moving: false,
            drag_location: None,
            box_select: None,
            active: true,
        })
    }

    /// Leave edit mode.
    pub fn exit<H: DrawHost + ?Sized>(mut self, host: &mut H) {
        self.stop(host);
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn selected_paths(&self) -> &BTreeSet<CoordPath> {
        &self.selected
    }

    pub fn phase(&self) -> EditPhase {
        if !self.active {
            EditPhase::Idle
        } else if self.box_select.is_some() {
            EditPhase::BoxSelecting
        } else if self.can_drag_move {
            if self.selected.is_empty() {
                EditPhase::Dragging(DragTarget::Feature)
            } else {
                EditPhase::Dragging(DragTarget::Vertices)
            }
        } else if self.selected.is_empty() {
            EditPhase::FeatureSelected
        } else {
            EditPhase::VertexSelected
        }
    }

    /// Vertex and midpoint handles for the feature under edit.
    pub fn handles<H: DrawHost + ?Sized>(&self, host: &H) -> Vec<SupplementaryPoint> {
        host.get_feature(&self.feature_id)
            .map(|f| supplementary_points(f, &self.selected))
            .unwrap_or_default()
    }

    /// Current box-selection rectangle, if one is being drawn.
    pub fn selection_box(&self) -> Option<ScreenBox> {
        self.box_select.map(|b| b.rect())
    }

    // ========== POINTER EVENTS ==========

    pub fn on_pointer_down<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if !self.active {
            return;
        }
        match &e.target {
            PointerTarget::Vertex { feature_id, path } if *feature_id == self.feature_id => {
                self.on_vertex(host, e, path.clone());
            }
            PointerTarget::Feature { id } if *id == self.feature_id => self.on_feature(host, e),
            PointerTarget::Midpoint {
                feature_id,
                path,
                position,
            } if *feature_id == self.feature_id => {
                self.on_midpoint(host, e, path.clone(), *position);
            }
            PointerTarget::None if e.shift => {
                host.set_drag_pan(false);
                let sel = BoxSelect {
                    start: e.point,
                    current: e.point,
                };
                host.set_box_overlay(Some(sel.rect()));
                self.box_select = Some(sel);
            }
            _ => {}
        }
    }

    pub fn on_drag<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if !self.active {
            return;
        }
        if let Some(sel) = self.box_select.as_mut() {
            sel.current = e.point;
            host.set_box_overlay(Some(sel.rect()));
            return;
        }
        if !self.can_drag_move {
            return;
        }
        let Some(from) = self.drag_location else {
            return;
        };

        self.drag_moving = true;
        let delta = GeoDelta::between(from, e.lng_lat);
        if self.selected.is_empty() {
            self.drag_feature(host, delta);
        } else {
            self.drag_vertices(host, delta);
        }
        self.drag_location = Some(e.lng_lat);
    }

    pub fn on_pointer_up<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if !self.active {
            return;
        }
        if let Some(mut sel) = self.box_select.take() {
            sel.current = e.point;
            self.finish_box_select(host, sel.rect());
            return;
        }
        if self.drag_moving {
            self.fire_update(host);
        }
        self.stop_dragging(host);
    }

    /// Clicking the active feature's body clears the vertex selection.
    /// Empty canvas and other features leave the session in edit mode.
    pub fn on_click<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if !self.active {
            return;
        }
        if let PointerTarget::Feature { id } = &e.target {
            if *id == self.feature_id {
                self.selected.clear();
            }
        }
        self.stop_dragging(host);
    }

    pub fn on_tap<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        self.on_click(host, e);
    }

    /// Pointer moving with no button held.
    pub fn on_pointer_move<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if !self.active {
            return;
        }
        let no_coords = self.selected.is_empty();
        let cursor = match &e.target {
            PointerTarget::Feature { id } if *id == self.feature_id && no_coords => Cursor::Move,
            PointerTarget::Vertex { .. } if !no_coords => Cursor::Move,
            PointerTarget::None if e.shift => Cursor::Crosshair,
            _ => Cursor::None,
        };
        host.set_cursor(cursor);
        self.stop_dragging(host);
    }

    /// Pointer left the canvas.
    pub fn on_mouse_out<H: DrawHost + ?Sized>(&mut self, host: &mut H) {
        if self.active && self.drag_moving {
            self.fire_update(host);
        }
    }

    /// Delete the selected vertices.
    pub fn on_trash<H: DrawHost + ?Sized>(&mut self, host: &mut H) {
        if !self.active {
            return;
        }
        let Some(feature) = host.get_feature_mut(&self.feature_id) else {
            return;
        };
        for path in self.selected.iter().rev() {
            feature.remove_coordinate(path);
        }
        let valid = feature.is_valid();
        self.fire_update(host);
        self.selected.clear();

        if !valid {
            tracing::info!(feature_id = %self.feature_id, "ring degenerated, deleting feature");
            let id = self.feature_id.clone();
            host.delete_feature(&id);
            self.change_mode(host, HostMode::SimpleSelect { feature_ids: Vec::new() });
        }
    }

    // ========== TRANSITIONS ==========

    fn on_vertex<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent, path: CoordPath) {
        self.start_dragging(host, e);
        if self.selected.contains(&path) {
            return;
        }
        if !e.shift {
            self.selected.clear();
        }
        self.selected.insert(path);
    }

    fn on_midpoint<H: DrawHost + ?Sized>(
        &mut self,
        host: &mut H,
        e: &PointerEvent,
        path: CoordPath,
        position: GeoPoint,
    ) {
        self.start_dragging(host, e);
        let inserted = host
            .get_feature_mut(&self.feature_id)
            .map(|f| f.add_coordinate(&path, position))
            .unwrap_or(false);
        if !inserted {
            return;
        }
        self.fire_update(host);
        self.selected.clear();
        self.selected.insert(path);
    }

    fn on_feature<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        if self.selected.is_empty() {
            self.start_dragging(host, e);
        } else {
            self.stop_dragging(host);
        }
    }

    fn finish_box_select<H: DrawHost + ?Sized>(&mut self, host: &mut H, rect: ScreenBox) {
        if let Some(feature) = host.get_feature(&self.feature_id) {
            let hits: Vec<CoordPath> = feature
                .vertices()
                .into_iter()
                .filter(|(_, p)| rect.contains(host.project(*p)))
                .map(|(path, _)| path)
                .collect();
            tracing::debug!(count = hits.len(), "box selected vertices");
            self.selected.extend(hits);
        }
        host.set_box_overlay(None);
        host.set_drag_pan(true);
    }

    fn drag_feature<H: DrawHost + ?Sized>(&mut self, host: &mut H, delta: GeoDelta) {
        let ids = host.selected_ids();
        if !move_features(host, &ids, delta) {
            tracing::debug!("feature drag rejected");
        }
    }

    /// Move every selected vertex by one shared, constrained delta.
    fn drag_vertices<H: DrawHost + ?Sized>(&mut self, host: &mut H, delta: GeoDelta) {
        let Some(feature) = host.get_feature(&self.feature_id) else {
            return;
        };

        let coords: Vec<(CoordPath, GeoPoint)> = self
            .selected
            .iter()
            .filter_map(|path| Some((path.clone(), feature.get_coordinate(path)?)))
            .collect();
        let singles: Vec<[GeoPoint; 1]> = coords.iter().map(|(_, p)| [*p]).collect();
        let slices: Vec<&[GeoPoint]> = singles.iter().map(|s| &s[..]).collect();
        let Some(constrained) = constrain_feature_movement(&slices, delta) else {
            tracing::debug!("vertex drag rejected");
            return;
        };

        let mut moved = feature.clone();
        for (path, p) in &coords {
            moved.update_coordinate(path, p.offset(constrained));
        }
        for (path, _) in &coords {
            let before = feature.ring_of(path).map(ring_self_intersects);
            let after = moved.ring_of(path).map(ring_self_intersects);
            if before == Some(false) && after == Some(true) {
                tracing::debug!(%path, "vertex drag would self-intersect");
                return;
            }
        }

        if let Some(slot) = host.get_feature_mut(&self.feature_id) {
            *slot = moved;
        }
    }

    fn start_dragging<H: DrawHost + ?Sized>(&mut self, host: &mut H, e: &PointerEvent) {
        host.set_drag_pan(false);
        self.can_drag_move = true;
        self.drag_location = Some(e.lng_lat);
    }

    fn stop_dragging<H: DrawHost + ?Sized>(&mut self, host: &mut H) {
        host.set_drag_pan(true);
        self.drag_moving = false;
        self.can_drag_move = false;
        self.drag_location = None;
    }

    fn fire_update<H: DrawHost + ?Sized>(&self, host: &mut H) {
        let features = host
            .selected_ids()
            .iter()
            .filter_map(|id| host.get_feature(id))
            .map(DrawFeature::to_geojson)
            .collect();
        host.fire_update(features);
    }

    fn change_mode<H: DrawHost + ?Sized>(&mut self, host: &mut H, mode: HostMode) {
        self.stop(host);
        host.change_mode(mode);
    }

    fn stop<H: DrawHost + ?Sized>(&mut self, host: &mut H) {
        if !self.active {
            return;
        }
        if self.box_select.take().is_some() {
            host.set_box_overlay(None);
        }
        self.stop_dragging(host);
        host.set_double_click_zoom(true);
        self.selected.clear();
        self.active = false;
        tracing::debug!(feature_id = %self.feature_id, "left direct select");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Datum, Offsets, PlanarPoint};

    struct Fixture {
        host: MemoryDrawHost,
        datum: Datum,
    }

    impl Fixture {
        fn new(ring_m: &[(f64, f64)]) -> Self {
            let datum = Datum::new(2.0, 43.0).unwrap();
            let viewport = Viewport::new(datum.geo(), 20.0, 800.0, 600.0);
            let mut host = MemoryDrawHost::new(viewport);
            let ring = ring_m
                .iter()
                .map(|(x, y)| datum.point_to_geo(Offsets::default(), PlanarPoint::new(*x, *y)).unwrap())
                .collect();
            host.add(DrawFeature::new("area-0", DrawGeometry::Polygon(vec![ring])));
            host.add(DrawFeature::new("dock", DrawGeometry::Point(datum.geo())));
            Self { host, datum }
        }

        fn square() -> Self {
            Self::new(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])
        }

        fn geo(&self, x: f64, y: f64) -> GeoPoint {
            self.datum
                .point_to_geo(Offsets::default(), PlanarPoint::new(x, y))
                .unwrap()
        }

        fn event(&self, x: f64, y: f64, shift: bool, target: PointerTarget) -> PointerEvent {
            let lng_lat = self.geo(x, y);
            PointerEvent {
                lng_lat,
                point: self.host.viewport.project(lng_lat),
                shift,
                target,
            }
        }

        fn vertex_event(&self, index: usize, shift: bool) -> PointerEvent {
            let path = CoordPath::vertex(0, index);
            let p = self.vertex(index);
            PointerEvent {
                lng_lat: p,
                point: self.host.viewport.project(p),
                shift,
                target: PointerTarget::Vertex {
                    feature_id: "area-0".into(),
                    path,
                },
            }
        }

        fn vertex(&self, index: usize) -> GeoPoint {
            self.host.features["area-0"]
                .get_coordinate(&CoordPath::vertex(0, index))
                .unwrap()
        }

        fn click_vertex(&mut self, session: &mut EditSession, index: usize, shift: bool) {
            let e = self.vertex_event(index, shift);
            session.on_pointer_down(&mut self.host, &e);
            session.on_pointer_up(&mut self.host, &e);
        }
    }

    fn paths(indices: &[usize]) -> BTreeSet<CoordPath> {
        indices.iter().map(|i| CoordPath::vertex(0, *i)).collect()
    }

    #[test]
    fn entry_rejects_points_and_unknown_ids() {
        let mut fx = Fixture::square();
        assert!(matches!(
            EditSession::enter(&mut fx.host, "dock", None),
            Err(MapError::InvalidModeEntry(_))
        ));
        assert!(matches!(
            EditSession::enter(&mut fx.host, "", None),
            Err(MapError::InvalidModeEntry(_))
        ));
        assert!(matches!(
            EditSession::enter(&mut fx.host, "area-9", None),
            Err(MapError::UnknownFeature(_))
        ));
        assert!(fx.host.double_click_zoom);
    }

    #[test]
    fn entry_disables_double_click_zoom_and_exit_restores_it() {
        let mut fx = Fixture::square();
        let session = EditSession::enter(&mut fx.host, "area-0", Some(CoordPath::vertex(0, 1))).unwrap();
        assert!(!fx.host.double_click_zoom);
        assert_eq!(session.phase(), EditPhase::VertexSelected);
        session.exit(&mut fx.host);
        assert!(fx.host.double_click_zoom);
        assert!(fx.host.drag_pan);
    }

    #[test]
    fn shift_adds_to_selection_and_plain_click_replaces() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();

        fx.click_vertex(&mut session, 0, false);
        fx.click_vertex(&mut session, 2, true);
        assert_eq!(session.selected_paths(), &paths(&[0, 2]));

        fx.click_vertex(&mut session, 3, false);
        assert_eq!(session.selected_paths(), &paths(&[3]));
    }

    #[test]
    fn box_select_unions_with_existing_selection() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        fx.click_vertex(&mut session, 0, false);

        let down = fx.event(5.0, -5.0, true, PointerTarget::None);
        session.on_pointer_down(&mut fx.host, &down);
        assert_eq!(session.phase(), EditPhase::BoxSelecting);
        assert!(!fx.host.drag_pan);

        let mid = fx.event(12.0, 8.0, true, PointerTarget::None);
        session.on_drag(&mut fx.host, &mid);
        assert!(fx.host.overlay.is_some());

        let up = fx.event(15.0, 15.0, true, PointerTarget::None);
        session.on_pointer_up(&mut fx.host, &up);

        assert_eq!(session.selected_paths(), &paths(&[0, 1, 2]));
        assert!(fx.host.overlay.is_none());
        assert!(fx.host.drag_pan);
        assert_eq!(session.phase(), EditPhase::VertexSelected);
    }

    #[test]
    fn grouped_vertices_move_by_identical_delta() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        fx.click_vertex(&mut session, 1, false);
        fx.click_vertex(&mut session, 2, true);
        let (v1, v2) = (fx.vertex(1), fx.vertex(2));

        let down = fx.vertex_event(2, false);
        session.on_pointer_down(&mut fx.host, &down);
        assert_eq!(session.phase(), EditPhase::Dragging(DragTarget::Vertices));
        assert_eq!(session.selected_paths(), &paths(&[1, 2]));

        let delta = GeoDelta::new(0.00002, 0.00001);
        let mut drag = down.clone();
        drag.lng_lat = down.lng_lat.offset(delta);
        session.on_drag(&mut fx.host, &drag);
        session.on_pointer_up(&mut fx.host, &drag);

        let moved1 = GeoDelta::between(v1, fx.vertex(1));
        let moved2 = GeoDelta::between(v2, fx.vertex(2));
        for moved in [moved1, moved2] {
            assert!((moved.lng - delta.lng).abs() < 1e-12);
            assert!((moved.lat - delta.lat).abs() < 1e-12);
        }
        assert_eq!(fx.vertex(0), fx.geo(0.0, 0.0));
        assert_eq!(fx.host.updates.len(), 1);
    }

    #[test]
    fn invalid_delta_moves_nothing() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        fx.click_vertex(&mut session, 1, false);
        fx.click_vertex(&mut session, 2, true);
        let before = fx.host.features["area-0"].clone();

        let down = fx.vertex_event(1, false);
        session.on_pointer_down(&mut fx.host, &down);
        let mut drag = down.clone();
        drag.lng_lat = GeoPoint::new(f64::NAN, down.lng_lat.lat);
        session.on_drag(&mut fx.host, &drag);

        assert_eq!(fx.host.features["area-0"], before);
    }

    #[test]
    fn self_intersecting_vertex_drag_is_rejected() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let before = fx.host.features["area-0"].clone();

        let down = fx.vertex_event(1, false);
        session.on_pointer_down(&mut fx.host, &down);
        let drag = fx.event(-10.0, 5.0, false, down.target.clone());
        session.on_drag(&mut fx.host, &drag);

        assert_eq!(fx.host.features["area-0"], before);
    }

    #[test]
    fn midpoint_press_inserts_vertex_and_selects_it() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let handle = session
            .handles(&fx.host)
            .into_iter()
            .find(|h| h.kind == HandleKind::Midpoint && h.coord_path == CoordPath::vertex(0, 1))
            .unwrap();

        let e = PointerEvent {
            lng_lat: handle.position,
            point: fx.host.viewport.project(handle.position),
            shift: false,
            target: PointerTarget::Midpoint {
                feature_id: "area-0".into(),
                path: handle.coord_path.clone(),
                position: handle.position,
            },
        };
        session.on_pointer_down(&mut fx.host, &e);

        assert_eq!(fx.host.features["area-0"].vertices().len(), 5);
        assert_eq!(fx.vertex(1), handle.position);
        assert_eq!(session.selected_paths(), &paths(&[1]));
        assert_eq!(session.phase(), EditPhase::Dragging(DragTarget::Vertices));
        assert_eq!(fx.host.updates.len(), 1);
    }

    #[test]
    fn trash_removes_in_descending_order() {
        let mut fx = Fixture::new(&[(0.0, 0.0), (5.0, -2.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let keep = [fx.vertex(0), fx.vertex(2), fx.vertex(4)];
        fx.click_vertex(&mut session, 1, false);
        fx.click_vertex(&mut session, 3, true);

        session.on_trash(&mut fx.host);

        let remaining: Vec<GeoPoint> = fx.host.features["area-0"]
            .vertices()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(remaining, keep);
        assert!(session.selected_paths().is_empty());
        assert!(session.is_active());
    }

    #[test]
    fn degenerate_ring_deletes_feature_and_reverts_mode() {
        let mut fx = Fixture::new(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        fx.click_vertex(&mut session, 0, false);

        session.on_trash(&mut fx.host);

        assert!(!fx.host.features.contains_key("area-0"));
        assert_eq!(
            fx.host.mode,
            Some(HostMode::SimpleSelect { feature_ids: Vec::new() })
        );
        assert_eq!(session.phase(), EditPhase::Idle);
        assert!(fx.host.double_click_zoom);
    }

    #[test]
    fn feature_body_drag_translates_whole_feature() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let before: Vec<GeoPoint> = (0..4).map(|i| fx.vertex(i)).collect();

        let target = PointerTarget::Feature { id: "area-0".into() };
        let down = fx.event(5.0, 5.0, false, target.clone());
        session.on_pointer_down(&mut fx.host, &down);
        assert_eq!(session.phase(), EditPhase::Dragging(DragTarget::Feature));

        let drag = fx.event(7.0, 6.0, false, target);
        session.on_drag(&mut fx.host, &drag);
        let delta = GeoDelta::between(down.lng_lat, drag.lng_lat);
        for (i, p) in before.iter().enumerate() {
            let moved = GeoDelta::between(*p, fx.vertex(i));
            assert!((moved.lng - delta.lng).abs() < 1e-12 && (moved.lat - delta.lat).abs() < 1e-12);
        }
    }

    #[test]
    fn pressing_body_with_vertex_selection_stops_dragging() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let down = fx.vertex_event(0, false);
        session.on_pointer_down(&mut fx.host, &down);
        assert!(matches!(session.phase(), EditPhase::Dragging(_)));

        let body = fx.event(5.0, 5.0, false, PointerTarget::Feature { id: "area-0".into() });
        session.on_pointer_down(&mut fx.host, &body);
        assert_eq!(session.phase(), EditPhase::VertexSelected);
        assert!(fx.host.drag_pan);
    }

    #[test]
    fn mouse_out_mid_drag_fires_update() {
        let mut fx = Fixture::square();
        let mut session = EditSession::enter(&mut fx.host, "area-0", None).unwrap();
        let down = fx.vertex_event(2, false);
        session.on_pointer_down(&mut fx.host, &down);
        let drag = fx.event(11.0, 11.0, false, down.target.clone());
        session.on_drag(&mut fx.host, &drag);

        session.on_mouse_out(&mut fx.host);
        assert_eq!(fx.host.updates.len(), 1);
        let update = fx.host.last_update().unwrap();
        assert_eq!(update.len(), 1);
        let edited = DrawFeature::from_geojson(&update[0]).unwrap();
        assert_eq!(edited.get_coordinate(&CoordPath::vertex(0, 2)), Some(fx.vertex(2)));
    }

    #[test]
    fn clicking_outside_the_feature_stays_in_edit_mode() {
        let mut fx = Fixture::square();
        let mut session =
            EditSession::enter(&mut fx.host, "area-0", Some(CoordPath::vertex(0, 1))).unwrap();

        let empty = fx.event(50.0, 50.0, false, PointerTarget::None);
        session.on_click(&mut fx.host, &empty);
        let other = fx.event(0.0, 0.0, false, PointerTarget::Feature { id: "dock".into() });
        session.on_tap(&mut fx.host, &other);

        assert!(session.is_active());
        assert_eq!(fx.host.mode, None);
        assert_eq!(session.phase(), EditPhase::VertexSelected);
        assert!(!fx.host.double_click_zoom);
    }

    #[test]
    fn clicking_feature_body_clears_vertex_selection() {
        let mut fx = Fixture::square();
        let mut session =
            EditSession::enter(&mut fx.host, "area-0", Some(CoordPath::vertex(0, 1))).unwrap();
        let body = fx.event(5.0, 5.0, false, PointerTarget::Feature { id: "area-0".into() });
        session.on_click(&mut fx.host, &body);
        assert!(session.selected_paths().is_empty());
        assert_eq!(session.phase(), EditPhase::FeatureSelected);
    }
}
