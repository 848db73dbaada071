//! Map surface contract consumed by the drawing engine.
//!
//! The engine never renders anything itself. It hands path primitives and
//! vertex handles to a [`MapSurface`], asks it to project coordinates into
//! pixel space for hit testing, and subscribes to pointer events through it.

use crate::geo::LatLng;
use crate::input::MapEventKind;
use crate::shapes::ShapeColor;
use crate::vertex::TargetId;
use kurbo::Point;
use std::collections::HashMap;

/// Handle to a visual layer (path or vertex handle) owned by the surface.
pub type LayerId = u64;

/// Handle to an event subscription.
pub type ListenerId = u64;

/// Geometry class of a path primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Closed, filled ring.
    Polygon,
    /// Closed, filled axis-aligned box given by its 4 corners.
    Rectangle,
    /// Open path.
    Polyline,
    /// Transient preview line or ghost box; never persisted.
    Guide,
}

/// Directional glyph decoration for polylines.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowMarker {
    /// Id of the shared glyph definition on the pane.
    pub glyph: String,
    /// Glyph rotated by 180 degrees.
    pub reversed: bool,
}

/// A simple path the surface knows how to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    pub kind: PathKind,
    pub coordinates: Vec<LatLng>,
    pub color: ShapeColor,
    pub fill_opacity: f64,
    pub dashed: bool,
    /// Mid-vertex glyph reference; only set once the glyph is defined on the pane.
    pub arrow: Option<ArrowMarker>,
    /// Whether the layer receives clicks (committed shapes only).
    pub interactive: bool,
}

impl PathPrimitive {
    pub fn guide(coordinates: Vec<LatLng>, color: ShapeColor) -> Self {
        Self {
            kind: PathKind::Guide,
            coordinates,
            color,
            fill_opacity: 0.0,
            dashed: true,
            arrow: None,
            interactive: false,
        }
    }
}

/// Shared glyph definition registered once on the drawing pane.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphDefinition {
    pub id: String,
    /// Glyph outline in a unit box, pointing along +x.
    pub outline: Vec<Point>,
}

impl GlyphDefinition {
    /// Chevron arrow glyph.
    pub fn arrow(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outline: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 5.0),
                Point::new(0.0, 10.0),
                Point::new(3.0, 5.0),
            ],
        }
    }
}

/// An externally owned point entity under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerHit {
    pub target: TargetId,
    pub latlng: LatLng,
}

/// Everything the engine needs from the map.
pub trait MapSurface {
    /// Project a coordinate to container pixels.
    fn project(&self, latlng: LatLng) -> Point;

    /// Inverse of [`MapSurface::project`].
    fn unproject(&self, point: Point) -> LatLng;

    /// Add a path layer.
    fn add_path(&mut self, path: &PathPrimitive) -> LayerId;

    /// Replace the geometry and style of an existing path layer.
    fn update_path(&mut self, layer: LayerId, path: &PathPrimitive);

    /// Add a draggable vertex handle.
    fn add_handle(&mut self, at: LatLng) -> LayerId;

    /// Move an existing vertex handle.
    fn move_handle(&mut self, layer: LayerId, to: LatLng);

    /// Remove any layer. Unknown ids are ignored.
    fn remove_layer(&mut self, layer: LayerId);

    /// Marker under the given pixel, if any.
    fn marker_at(&self, point: Point) -> Option<MarkerHit>;

    /// Move an external marker to follow a linked vertex.
    fn move_marker(&mut self, target: &TargetId, to: LatLng);

    /// Whether the drawing pane exists yet.
    fn pane_ready(&self) -> bool;

    /// Register a shared glyph on the drawing pane.
    fn define_glyph(&mut self, glyph: &GlyphDefinition);

    /// Subscribe to a set of events.
    fn listen(&mut self, kinds: &[MapEventKind]) -> ListenerId;

    /// Drop a subscription. Unknown ids are ignored.
    fn unlisten(&mut self, listener: ListenerId);

    /// Suppress or restore other map interactions (panning, double-click zoom).
    fn set_interactions_suppressed(&mut self, suppressed: bool);
}

/// In-memory surface with an equirectangular projection.
///
/// Records every layer, listener and glyph so hosts without a real map (the
/// headless runner, tests) can drive the engine and inspect the result.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    /// Pixels per degree.
    pub scale: f64,
    pub paths: HashMap<LayerId, PathPrimitive>,
    pub handles: HashMap<LayerId, LatLng>,
    pub markers: Vec<MarkerHit>,
    pub glyphs: Vec<GlyphDefinition>,
    pub listeners: HashMap<ListenerId, Vec<MapEventKind>>,
    pub interactions_suppressed: bool,
    pub pane: bool,
    pub marker_tolerance: f64,
    next_id: u64,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    /// A surface whose pane already exists.
    pub fn new() -> Self {
        Self {
            scale: 100.0,
            paths: HashMap::new(),
            handles: HashMap::new(),
            markers: Vec::new(),
            glyphs: Vec::new(),
            listeners: HashMap::new(),
            interactions_suppressed: false,
            pane: true,
            marker_tolerance: 8.0,
            next_id: 1,
        }
    }

    /// A surface whose pane has not been created yet.
    pub fn without_pane() -> Self {
        Self {
            pane: false,
            ..Self::new()
        }
    }

    pub fn add_marker(&mut self, target: impl Into<TargetId>, at: LatLng) {
        self.markers.push(MarkerHit {
            target: target.into(),
            latlng: at,
        });
    }

    pub fn marker(&self, target: &str) -> Option<&MarkerHit> {
        self.markers.iter().find(|m| m.target == target)
    }

    /// Paths of the given kind currently on the surface.
    pub fn paths_of(&self, kind: PathKind) -> Vec<&PathPrimitive> {
        self.paths.values().filter(|p| p.kind == kind).collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn issue_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl MapSurface for RecordingSurface {
    fn project(&self, latlng: LatLng) -> Point {
        Point::new(latlng.lng * self.scale, -latlng.lat * self.scale)
    }

    fn unproject(&self, point: Point) -> LatLng {
        LatLng::new(-point.y / self.scale, point.x / self.scale)
    }

    fn add_path(&mut self, path: &PathPrimitive) -> LayerId {
        let id = self.issue_id();
        self.paths.insert(id, path.clone());
        id
    }

    fn update_path(&mut self, layer: LayerId, path: &PathPrimitive) {
        if let Some(existing) = self.paths.get_mut(&layer) {
            *existing = path.clone();
        }
    }

    fn add_handle(&mut self, at: LatLng) -> LayerId {
        let id = self.issue_id();
        self.handles.insert(id, at);
        id
    }

    fn move_handle(&mut self, layer: LayerId, to: LatLng) {
        if let Some(existing) = self.handles.get_mut(&layer) {
            *existing = to;
        }
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.paths.remove(&layer);
        self.handles.remove(&layer);
    }

    fn marker_at(&self, point: Point) -> Option<MarkerHit> {
        self.markers
            .iter()
            .find(|m| {
                let p = self.project(m.latlng);
                (p - point).hypot() <= self.marker_tolerance
            })
            .cloned()
    }

    fn move_marker(&mut self, target: &TargetId, to: LatLng) {
        if let Some(marker) = self.markers.iter_mut().find(|m| &m.target == target) {
            marker.latlng = to;
        }
    }

    fn pane_ready(&self) -> bool {
        self.pane
    }

    fn define_glyph(&mut self, glyph: &GlyphDefinition) {
        self.glyphs.push(glyph.clone());
    }

    fn listen(&mut self, kinds: &[MapEventKind]) -> ListenerId {
        let id = self.issue_id();
        self.listeners.insert(id, kinds.to_vec());
        id
    }

    fn unlisten(&mut self, listener: ListenerId) {
        self.listeners.remove(&listener);
    }

    fn set_interactions_suppressed(&mut self, suppressed: bool) {
        self.interactions_suppressed = suppressed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_round_trip() {
        let surface = RecordingSurface::new();
        let ll = LatLng::new(12.5, -3.25);
        let back = surface.unproject(surface.project(ll));
        assert!((back.lat - ll.lat).abs() < 1e-9);
        assert!((back.lng - ll.lng).abs() < 1e-9);
    }

    #[test]
    fn test_north_is_up() {
        let surface = RecordingSurface::new();
        let north = surface.project(LatLng::new(1.0, 0.0));
        let south = surface.project(LatLng::new(0.0, 0.0));
        assert!(north.y < south.y);
    }

    #[test]
    fn test_marker_at_within_tolerance() {
        let mut surface = RecordingSurface::new();
        surface.add_marker("m1", LatLng::new(1.0, 1.0));
        let near = surface.project(LatLng::new(1.0, 1.0)) + kurbo::Vec2::new(3.0, 0.0);
        let far = surface.project(LatLng::new(2.0, 2.0));
        assert_eq!(surface.marker_at(near).map(|m| m.target), Some("m1".to_string()));
        assert!(surface.marker_at(far).is_none());
    }

    #[test]
    fn test_layers_and_listeners() {
        let mut surface = RecordingSurface::new();
        let path = PathPrimitive::guide(vec![LatLng::new(0.0, 0.0)], ShapeColor::default());
        let layer = surface.add_path(&path);
        let handle = surface.add_handle(LatLng::new(0.0, 0.0));
        assert_eq!(surface.paths.len(), 1);
        assert_eq!(surface.handles.len(), 1);
        surface.remove_layer(layer);
        surface.remove_layer(handle);
        surface.remove_layer(handle);
        assert!(surface.paths.is_empty());
        assert!(surface.handles.is_empty());

        let listener = surface.listen(&[MapEventKind::Click]);
        assert_eq!(surface.listener_count(), 1);
        surface.unlisten(listener);
        assert_eq!(surface.listener_count(), 0);
    }
}
