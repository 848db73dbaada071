//! Shape definitions for map drawing.
//!
//! Shapes own their vertices. The closed set of kinds is wrapped in the
//! [`Shape`] enum; per-kind construction rules live behind [`DrawShape`].

mod guide;
mod polygon;
mod polyline;
mod rectangle;

pub use guide::GuideLine;
pub use polygon::Polygon;
pub use polyline::{ArrowGlyphs, ArrowState, Polyline};
pub use rectangle::Rectangle;

use crate::config::EngineConfig;
use crate::geo::{LatLng, LatLngDelta};
use crate::snap::{PointerContext, SnapResult, mousemove_delta, resolve_pointer};
use crate::surface::{LayerId, MapSurface, PathKind, PathPrimitive};
use crate::vertex::{Vertex, VertexId, VertexLinks};
use kurbo::{BezPath, Point, Shape as KurboShape};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Shape kind discriminator, also the registry bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Polygon,
    Rectangle,
    Polyline,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Polygon, ShapeKind::Rectangle, ShapeKind::Polyline];

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Polygon => "polygon",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Polyline => "polyline",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid color: {0:?}")]
pub struct ColorParseError(pub String);

/// Stroke and fill color (RGBA8), serialized as a CSS hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ShapeColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// `#rrggbb`, or `#rrggbbaa` when not opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for ShapeColor {
    fn default() -> Self {
        Self::new(0x33, 0x88, 0xff, 0xff)
    }
}

impl FromStr for ShapeColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|_| err())
        };
        match hex.len() {
            3 => Ok(Self::new(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
            6 => Ok(Self::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for ShapeColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShapeColor> for String {
    fn from(color: ShapeColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for ShapeColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<ShapeColor> for Color {
    fn from(color: ShapeColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// "State changed, please persist" notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(ShapeId),
    Moved(ShapeId),
    Recolored(ShapeId),
    Annotated(ShapeId),
    Removed(ShapeId),
}

impl ChangeEvent {
    pub fn shape(&self) -> ShapeId {
        match *self {
            ChangeEvent::Created(id)
            | ChangeEvent::Moved(id)
            | ChangeEvent::Recolored(id)
            | ChangeEvent::Annotated(id)
            | ChangeEvent::Removed(id) => id,
        }
    }
}

/// Mutable engine services handed to shapes while they handle events.
pub struct DrawCtx<'a> {
    pub surface: &'a mut dyn MapSurface,
    pub links: &'a mut VertexLinks,
    pub glyphs: &'a mut ArrowGlyphs,
    pub config: &'a EngineConfig,
    pub changes: &'a mut Vec<ChangeEvent>,
}

impl DrawCtx<'_> {
    pub fn notify(&mut self, change: ChangeEvent) {
        self.changes.push(change);
    }
}

/// What a click did to a draft shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing was added.
    Ignored,
    /// A vertex was appended.
    Added,
    /// The user closed the shape by clicking its start vertex.
    Closed,
    /// The shape is geometrically complete and should be committed.
    Completed,
}

/// What an undo did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Unchanged,
    Popped,
    /// The shape released all its vertices.
    Removed,
    /// The shape has nothing to undo itself; the last committed shape of its
    /// kind should be removed instead.
    RemoveLastCommitted,
}

/// State shared by every shape kind.
#[derive(Debug)]
pub struct ShapeCore {
    pub(crate) id: ShapeId,
    pub(crate) color: ShapeColor,
    pub(crate) vertices: Vec<Vertex>,
    layer: Option<LayerId>,
    interactive: bool,
    drag_start: Option<LatLng>,
    pub(crate) mouse_loc: Option<SnapResult>,
}

impl ShapeCore {
    pub fn new(color: ShapeColor) -> Self {
        Self {
            id: Uuid::new_v4(),
            color,
            vertices: Vec::new(),
            layer: None,
            interactive: false,
            drag_start: None,
            mouse_loc: None,
        }
    }

    pub fn positions(&self) -> Vec<LatLng> {
        self.vertices.iter().map(Vertex::position).collect()
    }

    /// Where the preview currently points, if the pointer has moved.
    pub fn mouse_point(&self) -> Option<LatLng> {
        self.mouse_loc.as_ref().map(|s| s.point)
    }

    /// Build a visible vertex from a snap result, linking or targeting as snapped.
    pub(crate) fn make_vertex(&self, snap: &SnapResult, ctx: &mut DrawCtx<'_>) -> Vertex {
        let mut vertex = Vertex::new(snap.point, self.id).with_target(snap.marker().cloned());
        if let Some(other) = snap.vertex() {
            ctx.links.link(vertex.id(), other);
        }
        vertex.show(ctx.surface);
        vertex
    }

    /// Drop a vertex that left the shape.
    pub(crate) fn discard_vertex(mut vertex: Vertex, ctx: &mut DrawCtx<'_>) {
        vertex.hide(ctx.surface);
        ctx.links.unlink(vertex.id());
    }

    pub(crate) fn primitive(
        &self,
        kind: PathKind,
        coordinates: Vec<LatLng>,
        config: &EngineConfig,
    ) -> PathPrimitive {
        let fill_opacity = match kind {
            PathKind::Polygon | PathKind::Rectangle => config.polygon_fill_opacity,
            PathKind::Polyline | PathKind::Guide => 0.0,
        };
        PathPrimitive {
            kind,
            coordinates,
            color: self.color,
            fill_opacity,
            dashed: false,
            arrow: None,
            interactive: self.interactive,
        }
    }
}

/// Per-kind behavior behind the [`Shape`] enum.
pub trait DrawShape {
    fn kind(&self) -> ShapeKind;

    fn core(&self) -> &ShapeCore;

    fn core_mut(&mut self) -> &mut ShapeCore;

    /// Whether the shape satisfies its kind's commit invariant.
    fn can_save(&self) -> bool;

    /// Coordinates handed to the surface.
    fn coordinates(&self) -> Vec<LatLng> {
        self.core().positions()
    }

    fn primitive(&self, config: &EngineConfig, glyphs: &ArrowGlyphs) -> PathPrimitive;

    /// Reference point for axis snapping while drawing.
    fn anchor(&self) -> Option<LatLng> {
        self.core().vertices.last().map(Vertex::position)
    }

    /// Whether hit testing treats the shape as a filled area.
    fn is_area(&self) -> bool {
        true
    }

    /// Add a point at the snapped location.
    fn add_point(&mut self, snap: &SnapResult, ctx: &mut DrawCtx<'_>) -> ClickOutcome;

    /// Draw the kind's preview guides toward the current mouse location.
    fn render_guides(&mut self, ctx: &mut DrawCtx<'_>);

    /// Remove all preview guides from the surface.
    fn release_guides(&mut self, surface: &mut dyn MapSurface);

    /// A click landed on one of this shape's own vertices.
    fn on_selected_vertex(&mut self, _index: usize) -> ClickOutcome {
        ClickOutcome::Ignored
    }

    fn undo(&mut self, ctx: &mut DrawCtx<'_>) -> UndoOutcome;

    /// Move one vertex; returns every vertex whose position changed.
    fn move_vertex(
        &mut self,
        index: usize,
        to: LatLng,
        surface: &mut dyn MapSurface,
    ) -> Vec<(VertexId, LatLng)> {
        match self.core_mut().vertices.get_mut(index) {
            Some(vertex) => {
                vertex.drag_to(to, surface);
                vec![(vertex.id(), to)]
            }
            None => Vec::new(),
        }
    }

    /// Move every vertex by the same delta.
    fn translate(&mut self, delta: LatLngDelta, surface: &mut dyn MapSurface) {
        for vertex in &mut self.core_mut().vertices {
            let to = vertex.position() + delta;
            vertex.drag_to(to, surface);
        }
    }

    /// Hook run before the path layer is refreshed.
    fn before_redraw(&mut self, _ctx: &mut DrawCtx<'_>) {}
}

/// Refresh the shape's path layer from its current geometry.
pub(crate) fn redraw_shape(shape: &mut dyn DrawShape, ctx: &mut DrawCtx<'_>) {
    shape.before_redraw(ctx);
    let path = shape.primitive(ctx.config, &*ctx.glyphs);
    let core = shape.core_mut();
    if path.coordinates.is_empty() {
        if let Some(layer) = core.layer.take() {
            ctx.surface.remove_layer(layer);
        }
        return;
    }
    match core.layer {
        Some(layer) => ctx.surface.update_path(layer, &path),
        None => core.layer = Some(ctx.surface.add_path(&path)),
    }
}

/// Release the visual, the guides and every vertex. Safe to call twice.
pub(crate) fn remove_shape(shape: &mut dyn DrawShape, ctx: &mut DrawCtx<'_>) {
    shape.release_guides(ctx.surface);
    let core = shape.core_mut();
    let had_content = core.layer.is_some() || !core.vertices.is_empty();
    if let Some(layer) = core.layer.take() {
        ctx.surface.remove_layer(layer);
    }
    for vertex in core.vertices.drain(..) {
        ShapeCore::discard_vertex(vertex, ctx);
    }
    core.mouse_loc = None;
    core.drag_start = None;
    if had_content {
        let id = core.id;
        log::debug!("Released {} {}", shape.kind(), id);
        ctx.notify(ChangeEvent::Removed(id));
    }
}

/// Closed set of drawable shapes.
#[derive(Debug)]
pub enum Shape {
    Polygon(Polygon),
    Rectangle(Rectangle),
    Polyline(Polyline),
}

impl Shape {
    /// Create an empty shape of the given kind.
    pub fn new(kind: ShapeKind, color: ShapeColor) -> Self {
        match kind {
            ShapeKind::Polygon => Shape::Polygon(Polygon::new(color)),
            ShapeKind::Rectangle => Shape::Rectangle(Rectangle::new(color)),
            ShapeKind::Polyline => Shape::Polyline(Polyline::new(color)),
        }
    }

    pub(crate) fn inner(&self) -> &dyn DrawShape {
        match self {
            Shape::Polygon(s) => s,
            Shape::Rectangle(s) => s,
            Shape::Polyline(s) => s,
        }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut dyn DrawShape {
        match self {
            Shape::Polygon(s) => s,
            Shape::Rectangle(s) => s,
            Shape::Polyline(s) => s,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.inner().core().id
    }

    pub fn kind(&self) -> ShapeKind {
        self.inner().kind()
    }

    pub fn color(&self) -> ShapeColor {
        self.inner().core().color
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.inner().core().vertices
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.inner_mut().core_mut().vertices
    }

    pub fn positions(&self) -> Vec<LatLng> {
        self.inner().core().positions()
    }

    /// Coordinates as rendered (polylines with arrows include segment midpoints).
    pub fn coordinates(&self) -> Vec<LatLng> {
        self.inner().coordinates()
    }

    pub fn can_save(&self) -> bool {
        self.inner().can_save()
    }

    pub fn vertex_index(&self, id: VertexId) -> Option<usize> {
        self.vertices().iter().position(|v| v.id() == id)
    }

    pub fn as_polyline(&self) -> Option<&Polyline> {
        match self {
            Shape::Polyline(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_polyline_mut(&mut self) -> Option<&mut Polyline> {
        match self {
            Shape::Polyline(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_rectangle(&self) -> Option<&Rectangle> {
        match self {
            Shape::Rectangle(r) => Some(r),
            _ => None,
        }
    }

    /// Handle a click while this shape is the draft.
    ///
    /// A selected own vertex is consumed first (closing gesture); otherwise
    /// a point is added at the snapped location.
    pub fn on_click(&mut self, pointer: &PointerContext, ctx: &mut DrawCtx<'_>) -> ClickOutcome {
        let inner = self.inner_mut();
        let selected = inner.core().vertices.iter().position(Vertex::is_selected);
        if let Some(index) = selected {
            inner.core_mut().vertices[index].deselect();
            return inner.on_selected_vertex(index);
        }
        let snap = resolve_pointer(pointer, inner.anchor());
        let outcome = inner.add_point(&snap, ctx);
        inner.core_mut().mouse_loc = Some(snap);
        redraw_shape(inner, ctx);
        inner.render_guides(ctx);
        outcome
    }

    /// Update the preview location and guides.
    pub fn on_mousemove(&mut self, pointer: &PointerContext, ctx: &mut DrawCtx<'_>) {
        let inner = self.inner_mut();
        let snap = resolve_pointer(pointer, inner.anchor());
        inner.core_mut().mouse_loc = Some(snap);
        inner.render_guides(ctx);
    }

    pub fn begin_drag(&mut self, at: LatLng) {
        self.inner_mut().core_mut().drag_start = Some(at);
    }

    pub fn end_drag(&mut self) {
        self.inner_mut().core_mut().drag_start = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.inner().core().drag_start.is_some()
    }

    /// Incremental drag step. Moves this shape only and returns the applied
    /// delta so linked shapes can follow.
    pub fn on_drag(
        &mut self,
        at: LatLng,
        modifiers: crate::input::Modifiers,
        ctx: &mut DrawCtx<'_>,
    ) -> Option<LatLngDelta> {
        let start = self.inner().core().drag_start?;
        let delta = mousemove_delta(at, start, modifiers);
        self.inner_mut().core_mut().drag_start = Some(at);
        if delta.is_zero() {
            return None;
        }
        self.translate(delta, ctx);
        Some(delta)
    }

    pub fn translate(&mut self, delta: LatLngDelta, ctx: &mut DrawCtx<'_>) {
        let inner = self.inner_mut();
        inner.translate(delta, ctx.surface);
        redraw_shape(inner, ctx);
    }

    /// Move one vertex (handle drag); returns every vertex that changed.
    pub fn move_vertex(
        &mut self,
        index: usize,
        to: LatLng,
        ctx: &mut DrawCtx<'_>,
    ) -> Vec<(VertexId, LatLng)> {
        let inner = self.inner_mut();
        let moved = inner.move_vertex(index, to, ctx.surface);
        if !moved.is_empty() {
            redraw_shape(inner, ctx);
        }
        moved
    }

    pub fn undo(&mut self, ctx: &mut DrawCtx<'_>) -> UndoOutcome {
        self.inner_mut().undo(ctx)
    }

    pub fn set_color(&mut self, color: ShapeColor, ctx: &mut DrawCtx<'_>) {
        let inner = self.inner_mut();
        inner.core_mut().color = color;
        redraw_shape(inner, ctx);
        let id = inner.core().id;
        ctx.notify(ChangeEvent::Recolored(id));
    }

    /// Take a color without announcing it; used while the shape is a draft.
    pub(crate) fn adopt_color(&mut self, color: ShapeColor) {
        self.inner_mut().core_mut().color = color;
    }

    pub fn redraw(&mut self, ctx: &mut DrawCtx<'_>) {
        redraw_shape(self.inner_mut(), ctx);
    }

    pub fn remove(&mut self, ctx: &mut DrawCtx<'_>) {
        remove_shape(self.inner_mut(), ctx);
    }

    /// End the drawing phase: drop guides and transient state, self-remove
    /// when the commit invariant is not met.
    pub fn stop_drawing(&mut self, ctx: &mut DrawCtx<'_>) {
        let inner = self.inner_mut();
        inner.release_guides(ctx.surface);
        let core = inner.core_mut();
        core.mouse_loc = None;
        for vertex in &mut core.vertices {
            vertex.deselect();
        }
        if !inner.can_save() {
            remove_shape(inner, ctx);
        }
    }

    /// Render as a committed, clickable shape.
    pub fn show(&mut self, ctx: &mut DrawCtx<'_>) {
        let inner = self.inner_mut();
        inner.core_mut().interactive = true;
        redraw_shape(inner, ctx);
    }

    pub fn show_vertices(&mut self, surface: &mut dyn MapSurface) {
        for vertex in self.vertices_mut() {
            vertex.show(surface);
        }
    }

    pub fn hide_vertices(&mut self, surface: &mut dyn MapSurface) {
        for vertex in self.vertices_mut() {
            vertex.hide(surface);
        }
    }

    /// Check if a pixel hits this shape.
    pub fn hit_test(&self, pixel: Point, surface: &dyn MapSurface, tolerance: f64) -> bool {
        let points: Vec<Point> = self
            .positions()
            .into_iter()
            .map(|ll| surface.project(ll))
            .collect();
        let Some(&first) = points.first() else {
            return false;
        };
        if self.inner().is_area() && points.len() >= 3 {
            let mut path = BezPath::new();
            path.move_to(first);
            for p in &points[1..] {
                path.line_to(*p);
            }
            path.close_path();
            if path.contains(pixel) {
                return true;
            }
            let mut ring = points.clone();
            ring.push(first);
            return point_to_polyline_dist(pixel, &ring) <= tolerance;
        }
        if points.len() == 1 {
            return (pixel - first).hypot() <= tolerance;
        }
        point_to_polyline_dist(pixel, &points) <= tolerance
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::surface::RecordingSurface;

    /// Owns everything a [`DrawCtx`] borrows.
    pub struct Harness {
        pub surface: RecordingSurface,
        pub links: VertexLinks,
        pub glyphs: ArrowGlyphs,
        pub config: EngineConfig,
        pub changes: Vec<ChangeEvent>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_surface(RecordingSurface::new())
        }

        pub fn with_surface(surface: RecordingSurface) -> Self {
            Self {
                surface,
                links: VertexLinks::new(),
                glyphs: ArrowGlyphs::default(),
                config: EngineConfig::default(),
                changes: Vec::new(),
            }
        }

        pub fn ctx(&mut self) -> DrawCtx<'_> {
            DrawCtx {
                surface: &mut self.surface,
                links: &mut self.links,
                glyphs: &mut self.glyphs,
                config: &self.config,
                changes: &mut self.changes,
            }
        }
    }

    pub fn at(lat: f64, lng: f64) -> PointerContext {
        PointerContext::bare(LatLng::new(lat, lng), crate::input::Modifiers::NONE)
    }

    pub fn click(shape: &mut Shape, h: &mut Harness, lat: f64, lng: f64) -> ClickOutcome {
        shape.on_click(&at(lat, lng), &mut h.ctx())
    }
}
