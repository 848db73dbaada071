//! Polyline shape and its arrow decoration.

use super::{
    ChangeEvent, ClickOutcome, DrawCtx, DrawShape, GuideLine, ShapeColor, ShapeCore, ShapeId,
    ShapeKind, UndoOutcome, redraw_shape, remove_shape,
};
use crate::config::EngineConfig;
use crate::geo::LatLng;
use crate::snap::SnapResult;
use crate::surface::{ArrowMarker, GlyphDefinition, MapSurface, PathKind, PathPrimitive};
use serde::{Deserialize, Serialize};

/// Direction decoration of a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowState {
    #[default]
    None,
    Forward,
    Reversed,
}

impl ArrowState {
    /// none -> forward -> reversed -> none
    pub fn next(self) -> Self {
        match self {
            ArrowState::None => ArrowState::Forward,
            ArrowState::Forward => ArrowState::Reversed,
            ArrowState::Reversed => ArrowState::None,
        }
    }
}

/// Shared arrow glyph registration on the drawing pane.
///
/// The glyph is defined once, the first time a polyline with arrows is drawn
/// after the pane exists. Polylines drawn earlier are queued and redrawn by
/// the controller when the pane becomes ready.
#[derive(Debug, Default)]
pub struct ArrowGlyphs {
    defined: bool,
    pending: Vec<ShapeId>,
}

impl ArrowGlyphs {
    /// Define the glyph if the pane allows it. Returns whether it is defined.
    pub fn ensure(&mut self, surface: &mut dyn MapSurface, glyph_id: &str) -> bool {
        if !self.defined && surface.pane_ready() {
            surface.define_glyph(&GlyphDefinition::arrow(glyph_id));
            self.defined = true;
            log::debug!("Defined arrow glyph {glyph_id}");
        }
        self.defined
    }

    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Queue a shape to be redrawn once the glyph can be defined.
    pub fn defer(&mut self, shape: ShapeId) {
        if !self.pending.contains(&shape) {
            self.pending.push(shape);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<ShapeId> {
        std::mem::take(&mut self.pending)
    }
}

/// An open path of vertices.
#[derive(Debug)]
pub struct Polyline {
    core: ShapeCore,
    has_arrows: bool,
    arrows_reversed: bool,
    /// Last vertex → mouse.
    forward: GuideLine,
}

impl Polyline {
    pub const MIN_VERTICES: usize = 2;

    pub fn new(color: ShapeColor) -> Self {
        Self::from_core(ShapeCore::new(color))
    }

    pub(crate) fn from_core(core: ShapeCore) -> Self {
        Self {
            core,
            has_arrows: false,
            arrows_reversed: false,
            forward: GuideLine::new(),
        }
    }

    pub fn has_arrows(&self) -> bool {
        self.has_arrows
    }

    pub fn arrows_reversed(&self) -> bool {
        self.arrows_reversed
    }

    pub fn arrow_state(&self) -> ArrowState {
        match (self.has_arrows, self.arrows_reversed) {
            (false, _) => ArrowState::None,
            (true, false) => ArrowState::Forward,
            (true, true) => ArrowState::Reversed,
        }
    }

    /// Set the decoration without redrawing; used before the first render.
    pub(crate) fn init_arrows(&mut self, state: ArrowState) {
        self.has_arrows = state != ArrowState::None;
        self.arrows_reversed = state == ArrowState::Reversed;
    }

    pub fn set_arrows(&mut self, state: ArrowState, ctx: &mut DrawCtx<'_>) {
        if state == self.arrow_state() {
            return;
        }
        self.init_arrows(state);
        redraw_shape(self, ctx);
        ctx.notify(ChangeEvent::Annotated(self.core.id));
    }

    /// Advance the decoration one step and return the new state.
    pub fn cycle_arrows(&mut self, ctx: &mut DrawCtx<'_>) -> ArrowState {
        let next = self.arrow_state().next();
        self.set_arrows(next, ctx);
        next
    }
}

impl DrawShape for Polyline {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polyline
    }

    fn core(&self) -> &ShapeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ShapeCore {
        &mut self.core
    }

    fn can_save(&self) -> bool {
        self.core.vertices.len() >= Self::MIN_VERTICES
    }

    /// Raw positions, with a midpoint between every consecutive pair when
    /// arrows are on so the glyph sits centered on each segment.
    fn coordinates(&self) -> Vec<LatLng> {
        let positions = self.core.positions();
        if !self.has_arrows || positions.len() < 2 {
            return positions;
        }
        let mut coordinates = Vec::with_capacity(positions.len() * 2 - 1);
        for pair in positions.windows(2) {
            coordinates.push(pair[0]);
            coordinates.push(pair[0].midpoint(pair[1]));
        }
        coordinates.extend(positions.last().copied());
        coordinates
    }

    fn primitive(&self, config: &EngineConfig, glyphs: &ArrowGlyphs) -> PathPrimitive {
        let mut path = self.core.primitive(PathKind::Polyline, self.coordinates(), config);
        if self.has_arrows && glyphs.is_defined() {
            path.arrow = Some(ArrowMarker {
                glyph: config.arrow_glyph_id.clone(),
                reversed: self.arrows_reversed,
            });
        }
        path
    }

    fn is_area(&self) -> bool {
        false
    }

    fn add_point(&mut self, snap: &SnapResult, ctx: &mut DrawCtx<'_>) -> ClickOutcome {
        let vertex = self.core.make_vertex(snap, ctx);
        self.core.vertices.push(vertex);
        ClickOutcome::Added
    }

    fn render_guides(&mut self, ctx: &mut DrawCtx<'_>) {
        let last = self.core.vertices.last().map(|v| v.position());
        match (last, self.core.mouse_point()) {
            (Some(last), Some(mouse)) => {
                self.forward.draw(vec![last, mouse], self.core.color, ctx.surface);
            }
            _ => self.forward.release(ctx.surface),
        }
    }

    fn release_guides(&mut self, surface: &mut dyn MapSurface) {
        self.forward.release(surface);
    }

    fn undo(&mut self, ctx: &mut DrawCtx<'_>) -> UndoOutcome {
        let Some(vertex) = self.core.vertices.pop() else {
            return UndoOutcome::Unchanged;
        };
        ShapeCore::discard_vertex(vertex, ctx);
        if self.core.vertices.len() == 1 {
            remove_shape(self, ctx);
            return UndoOutcome::Removed;
        }
        redraw_shape(self, ctx);
        self.render_guides(ctx);
        UndoOutcome::Popped
    }

    fn before_redraw(&mut self, ctx: &mut DrawCtx<'_>) {
        if self.has_arrows && !ctx.glyphs.ensure(ctx.surface, &ctx.config.arrow_glyph_id) {
            ctx.glyphs.defer(self.core.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{Shape, ShapeKind};
    use super::*;
    use crate::surface::RecordingSurface;

    fn polyline() -> Shape {
        Shape::new(ShapeKind::Polyline, ShapeColor::black())
    }

    fn three_points(h: &mut Harness) -> Shape {
        let mut shape = polyline();
        for (lat, lng) in [(0.0, 0.0), (0.0, 2.0), (2.0, 2.0)] {
            click(&mut shape, h, lat, lng);
        }
        shape
    }

    #[test]
    fn test_lone_point_is_discarded() {
        let mut h = Harness::new();
        let mut shape = polyline();
        click(&mut shape, &mut h, 0.0, 0.0);
        assert!(!shape.can_save());
        shape.stop_drawing(&mut h.ctx());
        assert!(shape.vertices().is_empty());
        assert!(h.surface.handles.is_empty());
    }

    #[test]
    fn test_arrows_insert_midpoints() {
        let mut h = Harness::new();
        let mut shape = three_points(&mut h);
        let line = shape.as_polyline_mut().unwrap();
        line.set_arrows(ArrowState::Forward, &mut h.ctx());
        assert_eq!(
            shape.coordinates(),
            vec![
                LatLng::new(0.0, 0.0),
                LatLng::new(0.0, 1.0),
                LatLng::new(0.0, 2.0),
                LatLng::new(1.0, 2.0),
                LatLng::new(2.0, 2.0),
            ]
        );
    }

    #[test]
    fn test_arrows_toggle_restores_coordinates() {
        let mut h = Harness::new();
        let mut shape = three_points(&mut h);
        let original = shape.coordinates();
        let line = shape.as_polyline_mut().unwrap();
        line.set_arrows(ArrowState::Forward, &mut h.ctx());
        line.set_arrows(ArrowState::None, &mut h.ctx());
        assert_eq!(shape.coordinates(), original);
    }

    #[test]
    fn test_cycle_arrows_marks_path() {
        let mut h = Harness::new();
        let mut shape = three_points(&mut h);
        let id = shape.id();
        let line = shape.as_polyline_mut().unwrap();

        assert_eq!(line.cycle_arrows(&mut h.ctx()), ArrowState::Forward);
        let path = h.surface.paths_of(PathKind::Polyline)[0].clone();
        assert_eq!(path.arrow.map(|a| a.reversed), Some(false));
        assert_eq!(h.surface.glyphs.len(), 1);

        assert_eq!(line.cycle_arrows(&mut h.ctx()), ArrowState::Reversed);
        let path = h.surface.paths_of(PathKind::Polyline)[0].clone();
        assert_eq!(path.arrow.map(|a| a.reversed), Some(true));

        assert_eq!(line.cycle_arrows(&mut h.ctx()), ArrowState::None);
        assert!(h.surface.paths_of(PathKind::Polyline)[0].arrow.is_none());
        // Glyph is shared, never redefined.
        assert_eq!(h.surface.glyphs.len(), 1);
        assert_eq!(h.changes, vec![ChangeEvent::Annotated(id); 3]);
    }

    #[test]
    fn test_arrows_wait_for_pane() {
        let mut h = Harness::with_surface(RecordingSurface::without_pane());
        let mut shape = three_points(&mut h);
        let id = shape.id();
        shape.as_polyline_mut().unwrap().set_arrows(ArrowState::Forward, &mut h.ctx());
        assert!(h.surface.glyphs.is_empty());
        assert!(h.surface.paths_of(PathKind::Polyline)[0].arrow.is_none());
        assert!(h.glyphs.has_pending());

        h.surface.pane = true;
        assert_eq!(h.glyphs.take_pending(), vec![id]);
        shape.redraw(&mut h.ctx());
        assert_eq!(h.surface.glyphs.len(), 1);
        assert!(h.surface.paths_of(PathKind::Polyline)[0].arrow.is_some());
    }

    #[test]
    fn test_undo_self_removes_at_one_vertex() {
        let mut h = Harness::new();
        let mut shape = three_points(&mut h);
        assert_eq!(shape.undo(&mut h.ctx()), UndoOutcome::Popped);
        assert_eq!(shape.vertices().len(), 2);
        assert_eq!(shape.undo(&mut h.ctx()), UndoOutcome::Removed);
        assert!(shape.vertices().is_empty());
        assert!(h.surface.paths.is_empty());
        assert_eq!(shape.undo(&mut h.ctx()), UndoOutcome::Unchanged);
    }

    #[test]
    fn test_guide_follows_last_vertex() {
        let mut h = Harness::new();
        let mut shape = polyline();
        click(&mut shape, &mut h, 0.0, 0.0);
        click(&mut shape, &mut h, 0.0, 1.0);
        shape.on_mousemove(&at(1.0, 1.0), &mut h.ctx());
        let guides = h.surface.paths_of(PathKind::Guide);
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0].coordinates, vec![LatLng::new(0.0, 1.0), LatLng::new(1.0, 1.0)]);
    }
}
