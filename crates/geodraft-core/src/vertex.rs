//! Vertex handles and cross-shape vertex linkage.

use crate::geo::LatLng;
use crate::shapes::ShapeId;
use crate::surface::{LayerId, MapSurface};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Unique identifier for vertices.
pub type VertexId = Uuid;

/// Identifier of an externally owned point entity (a marker).
pub type TargetId = String;

/// A draggable point handle owned by exactly one shape.
#[derive(Debug, Clone)]
pub struct Vertex {
    id: VertexId,
    position: LatLng,
    parent: ShapeId,
    /// Non-owning reference to a marker this vertex mirrors.
    target: Option<TargetId>,
    selected: bool,
    handle: Option<LayerId>,
}

impl Vertex {
    pub fn new(position: LatLng, parent: ShapeId) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            parent,
            target: None,
            selected: false,
            handle: None,
        }
    }

    pub fn with_target(mut self, target: Option<TargetId>) -> Self {
        self.target = target;
        self
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn parent(&self) -> ShapeId {
        self.parent
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    /// Move the vertex and its visible handle. Does not touch the target.
    pub fn set_position(&mut self, position: LatLng, surface: &mut dyn MapSurface) {
        self.position = position;
        if let Some(handle) = self.handle {
            surface.move_handle(handle, position);
        }
    }

    /// Move the vertex and forward the move to its target, if any.
    pub fn drag_to(&mut self, position: LatLng, surface: &mut dyn MapSurface) {
        self.set_position(position, surface);
        if let Some(target) = &self.target {
            surface.move_marker(target, position);
        }
    }

    pub fn target(&self) -> Option<&TargetId> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: Option<TargetId>) {
        self.target = target;
    }

    /// Drop the target link after the marker went away.
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }

    pub fn is_visible(&self) -> bool {
        self.handle.is_some()
    }

    /// Attach the visual handle. No-op if already shown.
    pub fn show(&mut self, surface: &mut dyn MapSurface) {
        if self.handle.is_none() {
            self.handle = Some(surface.add_handle(self.position));
        }
    }

    /// Detach the visual handle without destroying the vertex.
    pub fn hide(&mut self, surface: &mut dyn MapSurface) {
        if let Some(handle) = self.handle.take() {
            surface.remove_layer(handle);
        }
    }
}

/// Explicit edge list of vertices that occupy the same point across shapes.
///
/// Links are symmetric. Moving one vertex of a linked pair moves the other.
#[derive(Debug, Clone, Default)]
pub struct VertexLinks {
    edges: HashMap<VertexId, HashSet<VertexId>>,
}

impl VertexLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&mut self, a: VertexId, b: VertexId) {
        if a == b {
            return;
        }
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
        log::debug!("Linked vertex {} <-> {}", a, b);
    }

    /// Remove every link touching the vertex.
    pub fn unlink(&mut self, vertex: VertexId) {
        if let Some(neighbors) = self.edges.remove(&vertex) {
            for n in neighbors {
                if let Some(set) = self.edges.get_mut(&n) {
                    set.remove(&vertex);
                    if set.is_empty() {
                        self.edges.remove(&n);
                    }
                }
            }
        }
    }

    /// Directly linked vertices.
    pub fn linked(&self, vertex: VertexId) -> Vec<VertexId> {
        self.edges
            .get(&vertex)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every vertex reachable through links, including `vertex` itself.
    pub fn component(&self, vertex: VertexId) -> HashSet<VertexId> {
        let mut seen = HashSet::from([vertex]);
        let mut stack = vec![vertex];
        while let Some(v) = stack.pop() {
            for &n in self.edges.get(&v).into_iter().flatten() {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        seen
    }

    pub fn is_linked(&self, a: VertexId, b: VertexId) -> bool {
        self.edges.get(&a).is_some_and(|set| set.contains(&b))
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
