//! Drawing session controller.
//!
//! One [`DrawingController`] exists per map. It owns the committed shapes,
//! the draft shape and the session state, and routes map events into them.

use crate::config::EngineConfig;
use crate::geo::{LatLng, LatLngDelta};
use crate::input::{DRAWING_EVENTS, MapEvent, Modifiers};
use crate::record::ShapeRecord;
use crate::registry::ShapeRegistry;
use crate::shapes::{
    ArrowGlyphs, ArrowState, ChangeEvent, ClickOutcome, DrawCtx, Shape, ShapeColor, ShapeId,
    ShapeKind, UndoOutcome,
};
use crate::snap::PointerContext;
use crate::surface::{ListenerId, MapSurface};
use crate::vertex::{TargetId, Vertex, VertexId, VertexLinks};
use kurbo::Point;
use std::collections::{HashSet, VecDeque};

/// The shape under construction and its drawing-event subscription.
#[derive(Debug)]
pub struct Draft {
    shape: Shape,
    listener: ListenerId,
}

impl Draft {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// A committed shape following the pointer.
#[derive(Debug)]
pub struct DragState {
    shape: ShapeId,
    /// Every shape moved so far, linked followers included.
    moved: Vec<ShapeId>,
}

impl DragState {
    pub fn shape(&self) -> ShapeId {
        self.shape
    }
}

/// What the controller is doing with pointer input.
#[derive(Debug, Default)]
pub enum Session {
    #[default]
    Idle,
    Drawing(Draft),
    /// Clicking a committed shape removes it.
    Deleting,
    /// Clicking a committed shape applies the current color.
    Coloring,
    /// Clicking a committed polyline cycles its arrows.
    Arrows,
    Dragging(DragState),
}

impl Session {
    pub fn name(&self) -> &'static str {
        match self {
            Session::Idle => "idle",
            Session::Drawing(_) => "drawing",
            Session::Deleting => "deleting",
            Session::Coloring => "coloring",
            Session::Arrows => "arrows",
            Session::Dragging(_) => "dragging",
        }
    }
}

/// A vertex under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoveredVertex {
    pub shape: ShapeId,
    pub vertex: VertexId,
    pub position: LatLng,
}

/// Engine state lent to shapes through [`DrawCtx`].
#[derive(Debug)]
struct Services {
    links: VertexLinks,
    glyphs: ArrowGlyphs,
    config: EngineConfig,
    changes: Vec<ChangeEvent>,
}

impl Services {
    fn ctx<'a>(&'a mut self, surface: &'a mut dyn MapSurface) -> DrawCtx<'a> {
        DrawCtx {
            surface,
            links: &mut self.links,
            glyphs: &mut self.glyphs,
            config: &self.config,
            changes: &mut self.changes,
        }
    }

    /// Drop notifications about a shape that was never committed.
    fn forget(&mut self, shape: ShapeId) {
        self.changes.retain(|c| c.shape() != shape);
    }

    fn moved(&mut self, shape: ShapeId) {
        let change = ChangeEvent::Moved(shape);
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }
}

/// Owns the drawing session for one map.
#[derive(Debug)]
pub struct DrawingController {
    session: Session,
    registry: ShapeRegistry,
    services: Services,
    /// Applied to new shapes and, in coloring mode, to clicked shapes.
    color: ShapeColor,
    /// New polylines start with arrows.
    arrows_latched: bool,
}

impl Default for DrawingController {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Mutable access to a committed shape or the draft.
fn shape_mut<'s>(
    registry: &'s mut ShapeRegistry,
    session: &'s mut Session,
    id: ShapeId,
) -> Option<&'s mut Shape> {
    if let Some(shape) = registry.get_mut(id) {
        return Some(shape);
    }
    match session {
        Session::Drawing(draft) if draft.shape.id() == id => Some(&mut draft.shape),
        _ => None,
    }
}

/// Nearest visible vertex of `shapes` within `tolerance` pixels of `pixel`.
fn nearest_vertex<'s>(
    shapes: impl Iterator<Item = &'s Shape>,
    pixel: Point,
    surface: &dyn MapSurface,
    tolerance: f64,
    exclude: &HashSet<VertexId>,
) -> Option<HoveredVertex> {
    shapes
        .flat_map(|s| s.vertices().iter().map(move |v| (s.id(), v)))
        .filter(|(_, v)| v.is_visible() && !exclude.contains(&v.id()))
        .map(|(shape, v)| (shape, v, (surface.project(v.position()) - pixel).hypot()))
        .filter(|&(_, _, distance)| distance <= tolerance)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(shape, v, _)| HoveredVertex {
            shape,
            vertex: v.id(),
            position: v.position(),
        })
}

/// Translate every committed shape linked to `origin` by the same delta.
/// Returns all moved shapes, `origin` first.
fn translate_linked(
    registry: &mut ShapeRegistry,
    services: &mut Services,
    origin: ShapeId,
    delta: LatLngDelta,
    surface: &mut dyn MapSurface,
) -> Vec<ShapeId> {
    let mut moved = vec![origin];
    let mut queue = VecDeque::from([origin]);
    while let Some(id) = queue.pop_front() {
        let vertices: Vec<VertexId> = registry
            .get(id)
            .map(|s| s.vertices().iter().map(Vertex::id).collect())
            .unwrap_or_default();
        for vertex in vertices {
            for linked in services.links.linked(vertex) {
                let Some((other, _)) = registry.locate_vertex(linked) else {
                    continue;
                };
                if moved.contains(&other) {
                    continue;
                }
                if let Some(shape) = registry.get_mut(other) {
                    shape.translate(delta, &mut services.ctx(surface));
                }
                moved.push(other);
                queue.push_back(other);
            }
        }
    }
    moved
}

impl DrawingController {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session: Session::Idle,
            registry: ShapeRegistry::new(),
            color: config.default_color,
            services: Services {
                links: VertexLinks::new(),
                glyphs: ArrowGlyphs::default(),
                config,
                changes: Vec::new(),
            },
            arrows_latched: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.session, Session::Drawing(_))
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self.session, Session::Deleting)
    }

    pub fn is_coloring(&self) -> bool {
        matches!(self.session, Session::Coloring)
    }

    pub fn is_adding_arrows(&self) -> bool {
        matches!(self.session, Session::Arrows)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.session, Session::Dragging(_))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }

    pub fn color(&self) -> ShapeColor {
        self.color
    }

    /// Color for shapes started from now on and for coloring mode.
    pub fn set_color(&mut self, color: ShapeColor) {
        self.color = color;
    }

    pub fn arrows_latched(&self) -> bool {
        self.arrows_latched
    }

    pub fn links(&self) -> &VertexLinks {
        &self.services.links
    }

    pub fn draft(&self) -> Option<&Shape> {
        match &self.session {
            Session::Drawing(draft) => Some(&draft.shape),
            _ => None,
        }
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.registry
    }

    /// Committed shapes of one kind, in creation order.
    pub fn shapes_of(&self, kind: ShapeKind) -> Vec<&Shape> {
        self.registry.of_kind(kind)
    }

    /// A committed shape or the draft.
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.registry
            .get(id)
            .or_else(|| self.draft().filter(|s| s.id() == id))
    }

    /// Pending "state changed" notifications, oldest first.
    pub fn drain_changes(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.services.changes)
    }

    fn all_shapes(&self) -> impl Iterator<Item = &Shape> {
        self.registry.ordered().chain(self.draft())
    }

    fn locate_vertex(&self, vertex: VertexId) -> Option<(ShapeId, usize)> {
        self.registry.locate_vertex(vertex).or_else(|| {
            let draft = self.draft()?;
            draft.vertex_index(vertex).map(|i| (draft.id(), i))
        })
    }

    /// Commit any current draft, then start drawing a new shape of `kind`.
    pub fn new_shape(&mut self, kind: ShapeKind, surface: &mut dyn MapSurface) -> ShapeId {
        let mut shape = Shape::new(kind, self.color);
        if self.arrows_latched {
            if let Some(line) = shape.as_polyline_mut() {
                line.init_arrows(ArrowState::Forward);
            }
        }
        self.start_drawing(shape, surface)
    }

    /// Install `shape` as the draft and subscribe to drawing events.
    ///
    /// Any existing draft is committed first. Vertex handles of committed
    /// shapes are shown so the new shape can snap to them.
    pub fn start_drawing(&mut self, mut shape: Shape, surface: &mut dyn MapSurface) -> ShapeId {
        self.save_shape(surface);
        self.reset_session(surface);

        let id = shape.id();
        let listener = surface.listen(&DRAWING_EVENTS);
        surface.set_interactions_suppressed(true);
        for committed in self.registry.shapes_mut() {
            committed.show_vertices(surface);
        }
        shape.show_vertices(surface);
        log::debug!("Drawing {} {}", shape.kind(), id);
        self.session = Session::Drawing(Draft { shape, listener });
        id
    }

    /// Tear down the draft's event bindings and hand the draft back.
    ///
    /// A draft that does not meet its commit rule has already released
    /// everything it drew when it is returned.
    pub fn stop_drawing(&mut self, surface: &mut dyn MapSurface) -> Option<Shape> {
        if !self.is_drawing() {
            return None;
        }
        let Session::Drawing(Draft { mut shape, listener }) = std::mem::take(&mut self.session)
        else {
            return None;
        };
        surface.unlisten(listener);
        surface.set_interactions_suppressed(false);
        shape.stop_drawing(&mut self.services.ctx(surface));
        Some(shape)
    }

    /// Commit the draft if it is valid, discard it otherwise.
    /// Drawing mode ends either way.
    pub fn save_shape(&mut self, surface: &mut dyn MapSurface) -> Option<ShapeId> {
        let mut shape = self.stop_drawing(surface)?;
        let id = shape.id();
        self.services.forget(id);
        if !shape.can_save() {
            log::debug!("Discarded {} {}", shape.kind(), id);
            return None;
        }
        shape.show(&mut self.services.ctx(surface));
        log::info!(
            "Committed {} {} with {} vertices",
            shape.kind(),
            id,
            shape.vertices().len()
        );
        self.registry.add(shape);
        self.services.changes.push(ChangeEvent::Created(id));
        Some(id)
    }

    /// Remove a committed shape. Unknown ids are ignored.
    pub fn remove_shape(&mut self, id: ShapeId, surface: &mut dyn MapSurface) -> bool {
        let Some(mut shape) = self.registry.remove(id) else {
            return false;
        };
        shape.remove(&mut self.services.ctx(surface));
        log::info!("Removed {} {}", shape.kind(), id);
        true
    }

    /// Discard the draft, valid or not.
    pub fn cancel(&mut self, surface: &mut dyn MapSurface) {
        if let Some(mut shape) = self.stop_drawing(surface) {
            shape.remove(&mut self.services.ctx(surface));
            self.services.forget(shape.id());
            log::debug!("Cancelled {} {}", shape.kind(), shape.id());
        }
    }

    /// Undo the last step of the draft. A rectangle draft with nothing to
    /// undo removes the most recent committed rectangle instead.
    pub fn undo(&mut self, surface: &mut dyn MapSurface) -> UndoOutcome {
        let Session::Drawing(draft) = &mut self.session else {
            return UndoOutcome::Unchanged;
        };
        let outcome = draft.shape.undo(&mut self.services.ctx(surface));
        let (id, kind) = (draft.shape.id(), draft.shape.kind());
        self.services.forget(id);
        if outcome == UndoOutcome::RemoveLastCommitted {
            if let Some(last) = self.registry.last_of_kind(kind) {
                self.remove_shape(last, surface);
            }
        }
        outcome
    }

    /// Commit the draft and return to idle.
    pub fn complete(&mut self, surface: &mut dyn MapSurface) -> Option<ShapeId> {
        let id = self.save_shape(surface);
        self.reset_session(surface);
        id
    }

    /// Commit the draft, return to idle and hide every vertex handle.
    pub fn done(&mut self, surface: &mut dyn MapSurface) -> Option<ShapeId> {
        let id = self.complete(surface);
        for shape in self.registry.shapes_mut() {
            shape.hide_vertices(surface);
        }
        id
    }

    pub fn toggle_delete(&mut self, surface: &mut dyn MapSurface) {
        self.toggle_mode(Session::Deleting, surface);
    }

    pub fn toggle_color(&mut self, surface: &mut dyn MapSurface) {
        self.toggle_mode(Session::Coloring, surface);
    }

    /// Switch the arrow tool. While on, new polylines start with arrows.
    ///
    /// Turning it on enters arrow mode. Turning it off leaves arrow mode but
    /// keeps any other session, since picking a drawing tool ends arrow mode
    /// without releasing the tool.
    pub fn toggle_arrows(&mut self, surface: &mut dyn MapSurface) {
        if self.arrows_latched {
            self.arrows_latched = false;
            if self.is_adding_arrows() {
                self.reset_session(surface);
            }
            log::debug!("Arrow tool off, session {}", self.session.name());
        } else {
            self.toggle_mode(Session::Arrows, surface);
            self.arrows_latched = true;
        }
    }

    fn toggle_mode(&mut self, mode: Session, surface: &mut dyn MapSurface) {
        let same = std::mem::discriminant(&self.session) == std::mem::discriminant(&mode);
        self.reset_session(surface);
        if !same {
            self.session = mode;
        }
        log::debug!("Session {}", self.session.name());
    }

    /// Leave the current mode. A draft is discarded, a drag is finished.
    fn reset_session(&mut self, surface: &mut dyn MapSurface) {
        self.cancel(surface);
        if let Session::Dragging(drag) = std::mem::take(&mut self.session) {
            self.finish_drag(drag, surface);
        }
    }

    /// Vertex currently flagged for the polygon-closing gesture.
    pub fn get_selected_vertex(&self) -> Option<(ShapeId, VertexId)> {
        self.all_shapes().find_map(|s| {
            s.vertices()
                .iter()
                .find(|v| v.is_selected())
                .map(|v| (s.id(), v.id()))
        })
    }

    /// Nearest visible vertex within hover tolerance of `pixel`.
    pub fn hovered_vertex(
        &self,
        pixel: Point,
        surface: &dyn MapSurface,
        exclude: &HashSet<VertexId>,
    ) -> Option<HoveredVertex> {
        let tolerance = self.services.config.vertex_hover_tolerance;
        nearest_vertex(self.all_shapes(), pixel, surface, tolerance, exclude)
    }

    /// Another vertex under the pointer while `vertex` is dragged to `at`.
    ///
    /// Vertices that move together with `vertex` are never candidates.
    pub fn get_vertex_targets(
        &self,
        vertex: VertexId,
        at: LatLng,
        surface: &dyn MapSurface,
    ) -> Option<HoveredVertex> {
        let mut exclude = self.services.links.component(vertex);
        if let Some(owner) = self.locate_vertex(vertex).and_then(|(id, _)| self.shape(id)) {
            exclude.extend(owner.vertices().iter().map(Vertex::id));
        }
        self.hovered_vertex(surface.project(at), surface, &exclude)
    }

    fn pointer(
        &self,
        latlng: LatLng,
        modifiers: Modifiers,
        surface: &dyn MapSurface,
    ) -> PointerContext {
        let pixel = surface.project(latlng);
        let hovered = self.hovered_vertex(pixel, surface, &HashSet::new());
        PointerContext {
            latlng,
            pixel,
            modifiers,
            hovered_vertex: hovered.map(|h| (h.vertex, h.position)),
            hovered_marker: surface.marker_at(pixel),
        }
    }

    /// Route one map event according to the session.
    pub fn handle_event(&mut self, event: MapEvent, surface: &mut dyn MapSurface) {
        match event {
            MapEvent::Click { latlng, modifiers } => self.on_click(latlng, modifiers, surface),
            MapEvent::PointerMove {
                latlng, modifiers, ..
            } => match self.session {
                Session::Drawing(_) => self.draw_move(latlng, modifiers, surface),
                Session::Dragging(_) => self.drag_step(latlng, modifiers, surface),
                _ => {}
            },
            MapEvent::PointerDown { latlng, .. } => self.begin_drag(latlng, surface),
            MapEvent::PointerUp { .. } => self.end_drag(surface),
            MapEvent::HandleDrag {
                vertex,
                latlng,
                modifiers,
            } => {
                self.drag_vertex(vertex, latlng, modifiers, surface);
            }
            MapEvent::MarkerDrag { target, latlng } => {
                self.target_moved(&target, latlng, surface);
            }
            MapEvent::MarkerRemoved { target } => {
                self.target_removed(&target);
            }
            MapEvent::PaneReady => self.pane_ready(surface),
        }
    }

    fn on_click(&mut self, latlng: LatLng, modifiers: Modifiers, surface: &mut dyn MapSurface) {
        let pixel = surface.project(latlng);
        let tolerance = self.services.config.shape_hit_tolerance;
        match self.session {
            Session::Drawing(_) => self.draw_click(latlng, modifiers, surface),
            Session::Deleting => {
                if let Some(id) = self.registry.shape_at(pixel, &*surface, tolerance, None) {
                    self.remove_shape(id, surface);
                }
            }
            Session::Coloring => {
                let hit = self.registry.shape_at(pixel, &*surface, tolerance, None);
                if let Some(shape) = hit.and_then(|id| self.registry.get_mut(id)) {
                    shape.set_color(self.color, &mut self.services.ctx(surface));
                }
            }
            Session::Arrows => {
                let hit = self
                    .registry
                    .shape_at(pixel, &*surface, tolerance, Some(ShapeKind::Polyline));
                let line = hit
                    .and_then(|id| self.registry.get_mut(id))
                    .and_then(Shape::as_polyline_mut);
                if let Some(line) = line {
                    let state = line.cycle_arrows(&mut self.services.ctx(surface));
                    log::debug!("Arrows {:?}", state);
                }
            }
            Session::Idle | Session::Dragging(_) => {}
        }
    }

    fn draw_click(&mut self, latlng: LatLng, modifiers: Modifiers, surface: &mut dyn MapSurface) {
        let mut pointer = self.pointer(latlng, modifiers, &*surface);
        // The draft's own vertices win over coincident vertices of other shapes.
        let tolerance = self.services.config.vertex_hover_tolerance;
        let own = nearest_vertex(
            self.draft().into_iter(),
            pointer.pixel,
            &*surface,
            tolerance,
            &HashSet::new(),
        );
        let color = self.color;
        let Session::Drawing(draft) = &mut self.session else {
            return;
        };

        // Own vertex: closing gesture. Another shape's vertex: snap and link.
        if let Some(own) = own {
            pointer.hovered_vertex = None;
            if let Some(index) = draft.shape.vertex_index(own.vertex) {
                draft.shape.vertices_mut()[index].select();
            }
        }
        if draft.shape.vertices().is_empty() {
            draft.shape.adopt_color(color);
        }

        let kind = draft.shape.kind();
        let outcome = draft.shape.on_click(&pointer, &mut self.services.ctx(surface));
        match outcome {
            ClickOutcome::Closed => {
                self.save_shape(surface);
            }
            ClickOutcome::Completed => {
                self.save_shape(surface);
                if kind == ShapeKind::Rectangle && self.services.config.chain_rectangles {
                    self.new_shape(kind, surface);
                }
            }
            ClickOutcome::Added | ClickOutcome::Ignored => {}
        }
    }

    fn draw_move(&mut self, latlng: LatLng, modifiers: Modifiers, surface: &mut dyn MapSurface) {
        let pointer = self.pointer(latlng, modifiers, &*surface);
        if let Session::Drawing(draft) = &mut self.session {
            draft
                .shape
                .on_mousemove(&pointer, &mut self.services.ctx(surface));
        }
    }

    fn begin_drag(&mut self, latlng: LatLng, surface: &mut dyn MapSurface) {
        if !matches!(self.session, Session::Idle) {
            return;
        }
        let pixel = surface.project(latlng);
        let tolerance = self.services.config.shape_hit_tolerance;
        let Some(id) = self.registry.shape_at(pixel, &*surface, tolerance, None) else {
            return;
        };
        if let Some(shape) = self.registry.get_mut(id) {
            shape.begin_drag(latlng);
        }
        surface.set_interactions_suppressed(true);
        log::debug!("Dragging {}", id);
        self.session = Session::Dragging(DragState {
            shape: id,
            moved: Vec::new(),
        });
    }

    fn drag_step(&mut self, latlng: LatLng, modifiers: Modifiers, surface: &mut dyn MapSurface) {
        let Session::Dragging(drag) = &mut self.session else {
            return;
        };
        let Some(shape) = self.registry.get_mut(drag.shape) else {
            return;
        };
        let Some(delta) = shape.on_drag(latlng, modifiers, &mut self.services.ctx(surface)) else {
            return;
        };
        let moved = translate_linked(&mut self.registry, &mut self.services, drag.shape, delta, surface);
        for id in moved {
            if !drag.moved.contains(&id) {
                drag.moved.push(id);
            }
        }
    }

    fn end_drag(&mut self, surface: &mut dyn MapSurface) {
        if !self.is_dragging() {
            return;
        }
        if let Session::Dragging(drag) = std::mem::take(&mut self.session) {
            self.finish_drag(drag, surface);
        }
    }

    fn finish_drag(&mut self, drag: DragState, surface: &mut dyn MapSurface) {
        if let Some(shape) = self.registry.get_mut(drag.shape) {
            shape.end_drag();
        }
        surface.set_interactions_suppressed(false);
        for id in drag.moved {
            self.services.moved(id);
        }
    }

    /// Move a vertex handle, snapping onto a hovered vertex unless shift is
    /// held. Shape rules apply and linked vertices follow.
    pub fn drag_vertex(
        &mut self,
        vertex: VertexId,
        latlng: LatLng,
        modifiers: Modifiers,
        surface: &mut dyn MapSurface,
    ) -> bool {
        let to = if modifiers.shift {
            latlng
        } else {
            self.get_vertex_targets(vertex, latlng, &*surface)
                .map_or(latlng, |h| h.position)
        };
        let moved = self.move_vertex_linked(vertex, to, surface);
        for &id in &moved {
            if self.registry.contains(id) {
                self.services.moved(id);
            }
        }
        !moved.is_empty()
    }

    /// Move one vertex and everything linked to it. Returns the touched shapes.
    fn move_vertex_linked(
        &mut self,
        vertex: VertexId,
        to: LatLng,
        surface: &mut dyn MapSurface,
    ) -> Vec<ShapeId> {
        let mut shapes = Vec::new();
        let mut visited = HashSet::from([vertex]);
        let mut queue = VecDeque::from([(vertex, to)]);
        while let Some((current, at)) = queue.pop_front() {
            let Some((shape_id, index)) = self.locate_vertex(current) else {
                continue;
            };
            let Some(shape) = shape_mut(&mut self.registry, &mut self.session, shape_id) else {
                continue;
            };
            let moved = shape.move_vertex(index, at, &mut self.services.ctx(surface));
            if !shapes.contains(&shape_id) {
                shapes.push(shape_id);
            }
            for (moved_vertex, position) in moved {
                visited.insert(moved_vertex);
                for linked in self.services.links.linked(moved_vertex) {
                    if visited.insert(linked) {
                        queue.push_back((linked, position));
                    }
                }
            }
        }
        shapes
    }

    fn set_vertex_target(&mut self, vertex: VertexId, target: Option<TargetId>) {
        let Some((shape_id, index)) = self.locate_vertex(vertex) else {
            return;
        };
        if let Some(shape) = shape_mut(&mut self.registry, &mut self.session, shape_id) {
            shape.vertices_mut()[index].set_target(target);
        }
    }

    /// A marker was dragged: mirror it onto every vertex bound to it.
    pub fn target_moved(
        &mut self,
        target: &TargetId,
        latlng: LatLng,
        surface: &mut dyn MapSurface,
    ) -> bool {
        let bound: Vec<VertexId> = self
            .all_shapes()
            .flat_map(Shape::vertices)
            .filter(|v| v.target() == Some(target))
            .map(Vertex::id)
            .collect();
        if bound.is_empty() {
            log::warn!("No vertex mirrors marker {target}");
            return false;
        }

        // Unbind while moving so the marker is not moved back onto itself.
        for &vertex in &bound {
            self.set_vertex_target(vertex, None);
        }
        for &vertex in &bound {
            for id in self.move_vertex_linked(vertex, latlng, surface) {
                if self.registry.contains(id) {
                    self.services.moved(id);
                }
            }
        }
        for &vertex in &bound {
            self.set_vertex_target(vertex, Some(target.clone()));
        }
        true
    }

    /// A marker was deleted: drop every reference to it.
    pub fn target_removed(&mut self, target: &TargetId) -> usize {
        let draft = match &mut self.session {
            Session::Drawing(draft) => Some(&mut draft.shape),
            _ => None,
        };
        let mut cleared = 0;
        for shape in self.registry.shapes_mut().chain(draft) {
            for vertex in shape.vertices_mut() {
                if vertex.target() == Some(target) {
                    vertex.clear_target();
                    cleared += 1;
                }
            }
        }
        log::debug!("Marker {target} removed, {cleared} vertices unbound");
        cleared
    }

    /// The drawing pane exists: redraw shapes that waited for the arrow glyph.
    pub fn pane_ready(&mut self, surface: &mut dyn MapSurface) {
        for id in self.services.glyphs.take_pending() {
            if let Some(shape) = shape_mut(&mut self.registry, &mut self.session, id) {
                shape.redraw(&mut self.services.ctx(surface));
            }
        }
    }

    /// Persistence records of every committed shape, in creation order.
    pub fn records(&self) -> Vec<ShapeRecord> {
        self.registry.ordered().map(Shape::to_record).collect()
    }

    /// Rebuild committed shapes from records. Invalid records are skipped.
    pub fn load_records(&mut self, records: &[ShapeRecord], surface: &mut dyn MapSurface) -> usize {
        let mut loaded = 0;
        for record in records {
            match Shape::from_record(record) {
                Ok(mut shape) => {
                    shape.show(&mut self.services.ctx(surface));
                    self.registry.add(shape);
                    loaded += 1;
                }
                Err(err) => log::warn!("Skipping {} record: {err}", record.kind),
            }
        }
        log::info!("Loaded {loaded} of {} shapes", records.len());
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerSource;
    use crate::surface::{PathKind, RecordingSurface};

    fn click(c: &mut DrawingController, s: &mut RecordingSurface, lat: f64, lng: f64) {
        c.handle_event(MapEvent::click(lat, lng), s);
    }

    fn draw(
        c: &mut DrawingController,
        s: &mut RecordingSurface,
        kind: ShapeKind,
        points: &[(f64, f64)],
    ) -> Option<ShapeId> {
        c.new_shape(kind, s);
        for &(lat, lng) in points {
            click(c, s, lat, lng);
        }
        c.complete(s)
    }

    #[test]
    fn test_polygon_end_to_end() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let red = ShapeColor::new(255, 0, 0, 255);
        c.set_color(red);
        c.new_shape(ShapeKind::Polygon, &mut s);
        click(&mut c, &mut s, 0.0, 0.0);
        c.set_color(ShapeColor::black());
        click(&mut c, &mut s, 0.0, 1.0);
        click(&mut c, &mut s, 1.0, 1.0);
        let id = c.complete(&mut s).unwrap();

        let polygons = c.shapes_of(ShapeKind::Polygon);
        assert_eq!(polygons.len(), 1);
        assert_eq!(
            polygons[0].positions(),
            vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0), LatLng::new(1.0, 1.0)]
        );
        assert_eq!(polygons[0].color(), red);
        assert!(!c.is_drawing());
        assert_eq!(c.drain_changes(), vec![ChangeEvent::Created(id)]);
        assert!(s.paths_of(PathKind::Polygon)[0].interactive);
    }

    #[test]
    fn test_underflow_polygon_is_discarded() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let id = draw(&mut c, &mut s, ShapeKind::Polygon, &[(0.0, 0.0), (0.0, 1.0)]);
        assert_eq!(id, None);
        assert!(c.shapes_of(ShapeKind::Polygon).is_empty());
        assert!(c.drain_changes().is_empty());
        assert!(s.paths.is_empty());
        assert!(s.handles.is_empty());
    }

    #[test]
    fn test_listeners_are_paired() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.new_shape(ShapeKind::Polyline, &mut s);
        assert_eq!(s.listener_count(), 1);
        assert!(s.interactions_suppressed);

        click(&mut c, &mut s, 0.0, 0.0);
        click(&mut c, &mut s, 0.0, 1.0);
        c.new_shape(ShapeKind::Polygon, &mut s);
        assert_eq!(s.listener_count(), 1);
        assert_eq!(c.shapes_of(ShapeKind::Polyline).len(), 1);

        c.cancel(&mut s);
        assert_eq!(s.listener_count(), 0);
        assert!(!s.interactions_suppressed);
        assert!(c.draft().is_none());
    }

    #[test]
    fn test_closing_click_commits_polygon() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.new_shape(ShapeKind::Polygon, &mut s);
        for (lat, lng) in [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            click(&mut c, &mut s, lat, lng);
        }
        // Within hover tolerance of the first vertex.
        click(&mut c, &mut s, 0.01, 0.01);
        assert!(!c.is_drawing());
        let polygons = c.shapes_of(ShapeKind::Polygon);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].vertices().len(), 3);
        assert_eq!(c.get_selected_vertex(), None);
    }

    #[test]
    fn test_closing_click_on_shared_start_vertex() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let line = draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, -1.0)]).unwrap();
        c.new_shape(ShapeKind::Polygon, &mut s);
        for (lat, lng) in [(0.01, 0.01), (0.0, 1.0), (1.0, 1.0)] {
            click(&mut c, &mut s, lat, lng);
        }
        let start = c.draft().unwrap().vertices()[0].id();
        let line_start = c.shape(line).unwrap().vertices()[0].id();
        assert!(c.links().is_linked(start, line_start));

        click(&mut c, &mut s, 0.0, 0.0);
        assert!(!c.is_drawing());
        let polygons = c.shapes_of(ShapeKind::Polygon);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].vertices().len(), 3);
        assert_eq!(polygons[0].positions()[0], LatLng::new(0.0, 0.0));
    }

    #[test]
    fn test_rectangles_chain_and_undo_removes_last() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.new_shape(ShapeKind::Rectangle, &mut s);
        click(&mut c, &mut s, 0.0, 0.0);
        click(&mut c, &mut s, 1.0, 1.0);
        assert_eq!(c.shapes_of(ShapeKind::Rectangle).len(), 1);
        assert_eq!(c.draft().map(Shape::kind), Some(ShapeKind::Rectangle));
        assert_eq!(s.listener_count(), 1);

        click(&mut c, &mut s, 3.0, 3.0);
        click(&mut c, &mut s, 4.0, 5.0);
        assert_eq!(c.shapes_of(ShapeKind::Rectangle).len(), 2);

        assert_eq!(c.undo(&mut s), UndoOutcome::RemoveLastCommitted);
        let remaining = c.shapes_of(ShapeKind::Rectangle);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].positions()[0], LatLng::new(1.0, 0.0));
    }

    #[test]
    fn test_delete_mode_removes_once() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.new_shape(ShapeKind::Rectangle, &mut s);
        click(&mut c, &mut s, 0.0, 0.0);
        click(&mut c, &mut s, 2.0, 2.0);
        let id = c.shapes_of(ShapeKind::Rectangle)[0].id();
        c.drain_changes();

        c.toggle_delete(&mut s);
        assert!(c.is_deleting());
        assert!(c.draft().is_none());
        assert_eq!(s.listener_count(), 0);

        click(&mut c, &mut s, 1.0, 1.0);
        assert!(c.shapes_of(ShapeKind::Rectangle).is_empty());
        assert_eq!(c.drain_changes(), vec![ChangeEvent::Removed(id)]);

        click(&mut c, &mut s, 1.0, 1.0);
        assert!(c.drain_changes().is_empty());
        assert!(s.paths.is_empty());

        c.toggle_delete(&mut s);
        assert!(matches!(c.session(), Session::Idle));
    }

    #[test]
    fn test_coloring_mode_recolors_clicked_shape() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let id = draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, 2.0)]).unwrap();
        c.drain_changes();

        let green = ShapeColor::new(0, 255, 0, 255);
        c.set_color(green);
        c.toggle_color(&mut s);
        click(&mut c, &mut s, 0.0, 1.0);
        assert_eq!(c.shape(id).map(Shape::color), Some(green));
        assert_eq!(c.drain_changes(), vec![ChangeEvent::Recolored(id)]);
    }

    #[test]
    fn test_arrow_mode_cycles_and_latches() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let id = draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, 2.0)]).unwrap();
        let state = |c: &DrawingController| c.shape(id).and_then(Shape::as_polyline).map(|l| l.arrow_state());

        c.toggle_arrows(&mut s);
        assert!(c.arrows_latched());
        click(&mut c, &mut s, 0.0, 1.0);
        assert_eq!(state(&c), Some(ArrowState::Forward));
        click(&mut c, &mut s, 0.0, 1.0);
        assert_eq!(state(&c), Some(ArrowState::Reversed));
        click(&mut c, &mut s, 0.0, 1.0);
        assert_eq!(state(&c), Some(ArrowState::None));

        let next = draw(&mut c, &mut s, ShapeKind::Polyline, &[(5.0, 0.0), (5.0, 1.0)]).unwrap();
        let line = c.shape(next).and_then(Shape::as_polyline).unwrap();
        assert_eq!(line.arrow_state(), ArrowState::Forward);

        c.toggle_arrows(&mut s);
        assert!(!c.arrows_latched());
        assert!(!c.is_adding_arrows());
    }

    #[test]
    fn test_arrow_tool_stays_in_step_with_its_toggle() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.toggle_arrows(&mut s);
        assert!(c.is_adding_arrows() && c.arrows_latched());
        c.toggle_arrows(&mut s);
        assert!(!c.is_adding_arrows() && !c.arrows_latched());

        // Drawing while latched leaves arrow mode; one press releases the tool.
        c.toggle_arrows(&mut s);
        c.new_shape(ShapeKind::Polyline, &mut s);
        click(&mut c, &mut s, 0.0, 0.0);
        c.toggle_arrows(&mut s);
        assert!(!c.arrows_latched());
        assert!(c.is_drawing());
        click(&mut c, &mut s, 0.0, 1.0);
        let id = c.complete(&mut s).unwrap();
        let line = c.shape(id).and_then(Shape::as_polyline).unwrap();
        assert_eq!(line.arrow_state(), ArrowState::Forward);

        c.toggle_arrows(&mut s);
        assert!(c.is_adding_arrows() && c.arrows_latched());
    }

    #[test]
    fn test_snapped_vertices_link_and_follow() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let line = draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, -1.0)]).unwrap();
        let polygon = draw(
            &mut c,
            &mut s,
            ShapeKind::Polygon,
            &[(0.02, 0.02), (0.0, 1.0), (1.0, 1.0)],
        )
        .unwrap();

        let line_start = c.shape(line).unwrap().vertices()[0].id();
        let corner = c.shape(polygon).unwrap().vertices()[0].id();
        assert_eq!(c.shape(polygon).unwrap().positions()[0], LatLng::new(0.0, 0.0));
        assert!(c.links().is_linked(line_start, corner));
        c.drain_changes();

        assert!(c.drag_vertex(line_start, LatLng::new(-0.5, 0.5), Modifiers::NONE, &mut s));
        assert_eq!(c.shape(polygon).unwrap().positions()[0], LatLng::new(-0.5, 0.5));
        let changes = c.drain_changes();
        assert!(changes.contains(&ChangeEvent::Moved(line)));
        assert!(changes.contains(&ChangeEvent::Moved(polygon)));
    }

    #[test]
    fn test_shape_drag_carries_linked_shapes() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        let line = draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, -1.0)]).unwrap();
        let polygon =
            draw(&mut c, &mut s, ShapeKind::Polygon, &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]).unwrap();
        c.drain_changes();

        c.handle_event(
            MapEvent::PointerDown {
                latlng: LatLng::new(0.25, 0.75),
                modifiers: Modifiers::NONE,
            },
            &mut s,
        );
        assert!(c.is_dragging());
        c.handle_event(
            MapEvent::PointerMove {
                latlng: LatLng::new(0.25, 1.25),
                modifiers: Modifiers::NONE,
                source: PointerSource::Mouse,
            },
            &mut s,
        );
        c.handle_event(
            MapEvent::PointerUp {
                latlng: LatLng::new(0.25, 1.25),
                modifiers: Modifiers::NONE,
            },
            &mut s,
        );

        assert!(!c.is_dragging());
        assert_eq!(c.shape(polygon).unwrap().positions()[0], LatLng::new(0.0, 0.5));
        assert_eq!(
            c.shape(line).unwrap().positions(),
            vec![LatLng::new(0.0, 0.5), LatLng::new(0.0, -0.5)]
        );
        let changes = c.drain_changes();
        assert_eq!(changes, vec![ChangeEvent::Moved(polygon), ChangeEvent::Moved(line)]);
    }

    #[test]
    fn test_marker_binding_is_bidirectional() {
        let mut s = RecordingSurface::new();
        s.add_marker("m", LatLng::new(1.0, 1.0));
        let mut c = DrawingController::default();
        let id = draw(&mut c, &mut s, ShapeKind::Polyline, &[(1.01, 1.0), (0.0, 0.0)]).unwrap();
        let vertex = c.shape(id).unwrap().vertices()[0].clone();
        assert_eq!(vertex.position(), LatLng::new(1.0, 1.0));
        assert_eq!(vertex.target().map(String::as_str), Some("m"));

        c.handle_event(
            MapEvent::MarkerDrag {
                target: "m".to_string(),
                latlng: LatLng::new(2.0, 2.0),
            },
            &mut s,
        );
        assert_eq!(c.shape(id).unwrap().positions()[0], LatLng::new(2.0, 2.0));

        c.handle_event(
            MapEvent::HandleDrag {
                vertex: vertex.id(),
                latlng: LatLng::new(3.0, 3.0),
                modifiers: Modifiers::SHIFT,
            },
            &mut s,
        );
        assert_eq!(s.marker("m").unwrap().latlng, LatLng::new(3.0, 3.0));

        c.handle_event(MapEvent::MarkerRemoved { target: "m".to_string() }, &mut s);
        assert!(c.shape(id).unwrap().vertices()[0].target().is_none());
        assert!(!c.target_moved(&"m".to_string(), LatLng::new(0.0, 0.0), &mut s));
    }

    #[test]
    fn test_pending_arrows_render_when_pane_ready() {
        let mut s = RecordingSurface::without_pane();
        let mut c = DrawingController::default();
        c.toggle_arrows(&mut s);
        draw(&mut c, &mut s, ShapeKind::Polyline, &[(0.0, 0.0), (0.0, 1.0)]).unwrap();
        assert!(s.glyphs.is_empty());
        assert!(s.paths_of(PathKind::Polyline)[0].arrow.is_none());

        s.pane = true;
        c.handle_event(MapEvent::PaneReady, &mut s);
        assert_eq!(s.glyphs.len(), 1);
        assert!(s.paths_of(PathKind::Polyline)[0].arrow.is_some());
    }

    #[test]
    fn test_done_hides_handles() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        c.new_shape(ShapeKind::Polyline, &mut s);
        click(&mut c, &mut s, 0.0, 0.0);
        click(&mut c, &mut s, 0.0, 1.0);
        assert_eq!(s.handles.len(), 2);
        c.done(&mut s);
        assert!(s.handles.is_empty());
        assert_eq!(c.shapes_of(ShapeKind::Polyline).len(), 1);

        c.new_shape(ShapeKind::Polygon, &mut s);
        assert_eq!(s.handles.len(), 2);
    }

    #[test]
    fn test_records_reload() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        draw(&mut c, &mut s, ShapeKind::Polygon, &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        c.new_shape(ShapeKind::Rectangle, &mut s);
        click(&mut c, &mut s, 2.0, 2.0);
        click(&mut c, &mut s, 3.0, 4.0);
        c.cancel(&mut s);
        let records = c.records();
        assert_eq!(records.len(), 2);

        let mut other_surface = RecordingSurface::new();
        let mut other = DrawingController::default();
        assert_eq!(other.load_records(&records, &mut other_surface), 2);
        assert_eq!(other.records(), records);
        assert_eq!(other_surface.paths.len(), 2);
        assert!(other.drain_changes().is_empty());
    }

    #[test]
    fn test_undo_outside_drawing_is_noop() {
        let mut s = RecordingSurface::new();
        let mut c = DrawingController::default();
        assert_eq!(c.undo(&mut s), UndoOutcome::Unchanged);
        c.new_shape(ShapeKind::Polygon, &mut s);
        assert_eq!(c.undo(&mut s), UndoOutcome::Unchanged);
        click(&mut c, &mut s, 0.0, 0.0);
        assert_eq!(c.undo(&mut s), UndoOutcome::Popped);
        assert!(c.draft().is_some_and(|d| d.vertices().is_empty()));
    }
}
