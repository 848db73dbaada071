//! Rectangle shape.

use super::{
    ArrowGlyphs, ClickOutcome, DrawCtx, DrawShape, GuideLine, ShapeColor, ShapeCore, ShapeKind,
    UndoOutcome, remove_shape,
};
use crate::config::EngineConfig;
use crate::geo::{Corner, LatLng, LatLngBounds, LatLngDelta};
use crate::snap::SnapResult;
use crate::surface::{MapSurface, PathKind, PathPrimitive};
use crate::vertex::{Vertex, VertexId};

/// An axis-aligned box built from two opposite corner clicks.
///
/// Once complete it holds exactly four vertices in NW, NE, SE, SW order.
#[derive(Debug)]
pub struct Rectangle {
    core: ShapeCore,
    bounds: Option<LatLngBounds>,
    /// Preview box between the first corner and the mouse.
    ghost: GuideLine,
}

impl Rectangle {
    pub const CORNERS: usize = 4;

    pub fn new(color: ShapeColor) -> Self {
        Self::from_core(ShapeCore::new(color))
    }

    pub(crate) fn from_core(core: ShapeCore) -> Self {
        let bounds = LatLngBounds::enclosing(&core.positions());
        Self {
            core,
            bounds,
            ghost: GuideLine::new(),
        }
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.bounds
    }

    pub fn is_complete(&self) -> bool {
        self.core.vertices.len() == Self::CORNERS
    }

    /// Finish the box from the planted corner and the second click.
    fn complete(&mut self, first: LatLng, snap: &SnapResult, ctx: &mut DrawCtx<'_>) {
        let bounds = LatLngBounds::from_corners(first, snap.point);
        let mut existing: Vec<Option<Vertex>> = self.core.vertices.drain(..).map(Some).collect();
        let mut clicked_used = false;
        let mut corners = Vec::with_capacity(Self::CORNERS);

        for corner in bounds.corners() {
            let reuse = existing
                .iter()
                .position(|v| v.as_ref().is_some_and(|v| v.position().same_as(corner)));
            let vertex = match reuse.and_then(|i| existing[i].take()) {
                Some(vertex) => vertex,
                None if !clicked_used && corner.same_as(snap.point) => {
                    clicked_used = true;
                    self.core.make_vertex(snap, ctx)
                }
                None => self.core.make_vertex(&SnapResult::none(corner), ctx),
            };
            corners.push(vertex);
        }
        for leftover in existing.into_iter().flatten() {
            ShapeCore::discard_vertex(leftover, ctx);
        }

        self.core.vertices = corners;
        self.bounds = Some(bounds);
        self.ghost.release(ctx.surface);
        log::debug!("Rectangle {} spans {:?}", self.core.id, bounds);
    }

    fn refresh_bounds(&mut self) {
        self.bounds = LatLngBounds::enclosing(&self.core.positions());
    }
}

impl DrawShape for Rectangle {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rectangle
    }

    fn core(&self) -> &ShapeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ShapeCore {
        &mut self.core
    }

    fn can_save(&self) -> bool {
        self.is_complete()
    }

    fn primitive(&self, config: &EngineConfig, _glyphs: &ArrowGlyphs) -> PathPrimitive {
        let coordinates = if self.is_complete() {
            self.coordinates()
        } else {
            Vec::new()
        };
        self.core.primitive(PathKind::Rectangle, coordinates, config)
    }

    /// Corners are free in both axes, so shift never pins the second click.
    fn anchor(&self) -> Option<LatLng> {
        None
    }

    fn add_point(&mut self, snap: &SnapResult, ctx: &mut DrawCtx<'_>) -> ClickOutcome {
        match self.core.vertices.len() {
            0 => {
                let vertex = self.core.make_vertex(snap, ctx);
                self.core.vertices.push(vertex);
                self.bounds = Some(LatLngBounds::at(snap.point));
                ClickOutcome::Added
            }
            1 => {
                let first = self.core.vertices[0].position();
                if first.same_as(snap.point) {
                    return ClickOutcome::Ignored;
                }
                self.complete(first, snap, ctx);
                ClickOutcome::Completed
            }
            _ => ClickOutcome::Ignored,
        }
    }

    fn render_guides(&mut self, ctx: &mut DrawCtx<'_>) {
        let first = self.core.vertices.first().map(Vertex::position);
        match (first, self.core.mouse_point()) {
            (Some(first), Some(mouse)) if self.core.vertices.len() == 1 => {
                let preview = LatLngBounds::from_corners(first, mouse);
                let mut ring = preview.corners().to_vec();
                ring.push(preview.corner(Corner::NorthWest));
                self.ghost.draw(ring, self.core.color, ctx.surface);
            }
            _ => self.ghost.release(ctx.surface),
        }
    }

    fn release_guides(&mut self, surface: &mut dyn MapSurface) {
        self.ghost.release(surface);
    }

    fn undo(&mut self, ctx: &mut DrawCtx<'_>) -> UndoOutcome {
        if self.core.vertices.is_empty() {
            return UndoOutcome::RemoveLastCommitted;
        }
        remove_shape(self, ctx);
        self.bounds = None;
        UndoOutcome::Removed
    }

    fn move_vertex(
        &mut self,
        index: usize,
        to: LatLng,
        surface: &mut dyn MapSurface,
    ) -> Vec<(VertexId, LatLng)> {
        let Some(old) = self.core.vertices.get(index).map(Vertex::position) else {
            return Vec::new();
        };
        let delta = to - old;
        let mut moved = vec![(self.core.vertices[index].id(), to)];
        self.core.vertices[index].drag_to(to, surface);

        if let (true, Some(corner)) = (self.is_complete(), Corner::from_index(index)) {
            let lat_partner = &mut self.core.vertices[corner.lat_partner().index()];
            let pos = lat_partner.position();
            let pos = LatLng::new(pos.lat + delta.lat, pos.lng);
            lat_partner.drag_to(pos, surface);
            moved.push((lat_partner.id(), pos));

            let lng_partner = &mut self.core.vertices[corner.lng_partner().index()];
            let pos = lng_partner.position();
            let pos = LatLng::new(pos.lat, pos.lng + delta.lng);
            lng_partner.drag_to(pos, surface);
            moved.push((lng_partner.id(), pos));
        }
        self.refresh_bounds();
        moved
    }

    fn translate(&mut self, delta: LatLngDelta, surface: &mut dyn MapSurface) {
        for vertex in &mut self.core.vertices {
            let to = vertex.position() + delta;
            vertex.drag_to(to, surface);
        }
        if let Some(bounds) = &mut self.bounds {
            bounds.translate(delta);
        }
    }
}
