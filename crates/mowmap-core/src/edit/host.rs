//! Capabilities the edit session needs from the map canvas.
//!
//! [`MemoryDrawHost`] keeps everything in memory and projects with web
//! mercator, which is enough to drive the session headless.

use std::collections::BTreeMap;

use geojson::Feature;

use crate::geo::GeoPoint;

use super::feature::DrawFeature;

/// Pixel position on the canvas, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBox {
    pub min: ScreenPoint,
    pub max: ScreenPoint,
}

impl ScreenBox {
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        Self {
            min: ScreenPoint::new(a.x.min(b.x), a.y.min(b.y)),
            max: ScreenPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: ScreenPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    None,
    Move,
    Crosshair,
}

/// Mode the host switches to when the session hands control back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMode {
    SimpleSelect { feature_ids: Vec<String> },
}

pub trait DrawHost {
    fn get_feature(&self, id: &str) -> Option<&DrawFeature>;

    fn get_feature_mut(&mut self, id: &str) -> Option<&mut DrawFeature>;

    fn delete_feature(&mut self, id: &str);

    /// Ids of the features currently selected on the canvas.
    fn selected_ids(&self) -> Vec<String>;

    fn set_selected(&mut self, ids: &[String]);

    fn project(&self, point: GeoPoint) -> ScreenPoint;

    fn set_drag_pan(&mut self, enabled: bool);

    fn set_double_click_zoom(&mut self, enabled: bool);

    /// Draw or clear the box-selection overlay.
    fn set_box_overlay(&mut self, rect: Option<ScreenBox>);

    fn set_cursor(&mut self, cursor: Cursor);

    fn change_mode(&mut self, mode: HostMode);

    /// "Feature updated" notification carrying the full current GeoJSON.
    fn fire_update(&mut self, features: Vec<Feature>);
}

/// Web mercator camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

const TILE_SIZE: f64 = 512.0;

impl Viewport {
    pub fn new(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    fn to_world(&self, p: GeoPoint) -> (f64, f64) {
        let size = self.world_size();
        let x = (p.lon + 180.0) / 360.0 * size;
        let lat = p.lat.to_radians();
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * size;
        (x, y)
    }

    pub fn project(&self, p: GeoPoint) -> ScreenPoint {
        let (cx, cy) = self.to_world(self.center);
        let (x, y) = self.to_world(p);
        ScreenPoint::new(x - cx + self.width / 2.0, y - cy + self.height / 2.0)
    }
}

/// Headless host used by tools and tests.
#[derive(Debug, Clone)]
pub struct MemoryDrawHost {
    pub viewport: Viewport,
    pub features: BTreeMap<String, DrawFeature>,
    pub selected: Vec<String>,
    pub drag_pan: bool,
    pub double_click_zoom: bool,
    pub overlay: Option<ScreenBox>,
    pub cursor: Cursor,
    pub mode: Option<HostMode>,
    /// Every "feature updated" payload, oldest first.
    pub updates: Vec<Vec<Feature>>,
}

impl MemoryDrawHost {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            features: BTreeMap::new(),
            selected: Vec::new(),
            drag_pan: true,
            double_click_zoom: true,
            overlay: None,
            cursor: Cursor::None,
            mode: None,
            updates: Vec::new(),
        }
    }

    pub fn add(&mut self, feature: DrawFeature) {
        self.features.insert(feature.id.clone(), feature);
    }

    pub fn last_update(&self) -> Option<&[Feature]> {
        self.updates.last().map(Vec::as_slice)
    }
}

impl DrawHost for MemoryDrawHost {
    fn get_feature(&self, id: &str) -> Option<&DrawFeature> {
        self.features.get(id)
    }

    fn get_feature_mut(&mut self, id: &str) -> Option<&mut DrawFeature> {
        self.features.get_mut(id)
    }

    fn delete_feature(&mut self, id: &str) {
        self.features.remove(id);
        self.selected.retain(|s| s != id);
    }

    fn selected_ids(&self) -> Vec<String> {
        self.selected.clone()
    }

    fn set_selected(&mut self, ids: &[String]) {
        self.selected = ids.to_vec();
    }

    fn project(&self, point: GeoPoint) -> ScreenPoint {
        self.viewport.project(point)
    }

    fn set_drag_pan(&mut self, enabled: bool) {
        self.drag_pan = enabled;
    }

    fn set_double_click_zoom(&mut self, enabled: bool) {
        self.double_click_zoom = enabled;
    }

    fn set_box_overlay(&mut self, rect: Option<ScreenBox>) {
        self.overlay = rect;
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn change_mode(&mut self, mode: HostMode) {
        self.mode = Some(mode);
    }

    fn fire_update(&mut self, features: Vec<Feature>) {
        self.updates.push(features);
    }
}
