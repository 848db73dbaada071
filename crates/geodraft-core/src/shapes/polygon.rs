//! Polygon shape.

use super::{
    ArrowGlyphs, ClickOutcome, DrawCtx, DrawShape, GuideLine, ShapeColor, ShapeCore, ShapeKind,
    UndoOutcome, redraw_shape,
};
use crate::config::EngineConfig;
use crate::snap::SnapResult;
use crate::surface::{MapSurface, PathKind, PathPrimitive};

/// A closed ring of at least three vertices.
#[derive(Debug)]
pub struct Polygon {
    core: ShapeCore,
    /// Last vertex → mouse.
    forward: GuideLine,
    /// First vertex → mouse, previews the closing edge.
    backward: GuideLine,
}

impl Polygon {
    pub const MIN_VERTICES: usize = 3;

    pub fn new(color: ShapeColor) -> Self {
        Self::from_core(ShapeCore::new(color))
    }

    pub(crate) fn from_core(core: ShapeCore) -> Self {
        Self {
            core,
            forward: GuideLine::new(),
            backward: GuideLine::new(),
        }
    }
}

impl DrawShape for Polygon {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polygon
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

    fn primitive(&self, config: &EngineConfig, _glyphs: &ArrowGlyphs) -> PathPrimitive {
        self.core.primitive(PathKind::Polygon, self.coordinates(), config)
    }

    fn add_point(&mut self, snap: &SnapResult, ctx: &mut DrawCtx<'_>) -> ClickOutcome {
        let vertex = self.core.make_vertex(snap, ctx);
        log::debug!("Polygon {} vertex {} at {:?}", self.core.id, self.core.vertices.len(), snap.point);
        self.core.vertices.push(vertex);
        ClickOutcome::Added
    }

    fn render_guides(&mut self, ctx: &mut DrawCtx<'_>) {
        let Some(mouse) = self.core.mouse_point() else {
            return;
        };
        let color = self.core.color;
        let first = self.core.vertices.first().map(|v| v.position());
        let last = self.core.vertices.last().map(|v| v.position());
        let (Some(first), Some(last)) = (first, last) else {
            self.release_guides(ctx.surface);
            return;
        };
        self.forward.draw(vec![last, mouse], color, ctx.surface);
        if self.core.vertices.len() >= 2 {
            self.backward.draw(vec![first, mouse], color, ctx.surface);
        } else {
            self.backward.release(ctx.surface);
        }
    }

    fn release_guides(&mut self, surface: &mut dyn MapSurface) {
        self.forward.release(surface);
        self.backward.release(surface);
    }

    fn on_selected_vertex(&mut self, index: usize) -> ClickOutcome {
        if index == 0 && self.can_save() {
            ClickOutcome::Closed
        } else {
            ClickOutcome::Ignored
        }
    }

    fn undo(&mut self, ctx: &mut DrawCtx<'_>) -> UndoOutcome {
        let Some(vertex) = self.core.vertices.pop() else {
            return UndoOutcome::Unchanged;
        };
        ShapeCore::discard_vertex(vertex, ctx);
        redraw_shape(self, ctx);
        self.render_guides(ctx);
        UndoOutcome::Popped
    }
}
