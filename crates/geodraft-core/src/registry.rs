//! Committed shapes, bucketed by kind and kept in creation order.

use crate::shapes::{Shape, ShapeId, ShapeKind};
use crate::surface::MapSurface;
use crate::vertex::VertexId;
use kurbo::Point;
use std::collections::HashMap;

/// All committed shapes on one map.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<ShapeId, Shape>,
    /// Creation order (back to front).
    z_order: Vec<ShapeId>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shape: Shape) {
        let id = shape.id();
        self.z_order.push(id);
        self.shapes.insert(id, shape);
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<Shape> {
        self.z_order.retain(|&shape_id| shape_id != id);
        self.shapes.remove(&id)
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    /// Shapes in creation order.
    pub fn ordered(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    pub fn ids(&self) -> Vec<ShapeId> {
        self.z_order.clone()
    }

    /// Committed shapes of one kind, in creation order.
    pub fn of_kind(&self, kind: ShapeKind) -> Vec<&Shape> {
        self.ordered().filter(|s| s.kind() == kind).collect()
    }

    /// Most recently committed shape of a kind.
    pub fn last_of_kind(&self, kind: ShapeKind) -> Option<ShapeId> {
        self.z_order
            .iter()
            .rev()
            .copied()
            .find(|id| self.shapes.get(id).is_some_and(|s| s.kind() == kind))
    }

    /// Topmost shape under a pixel, optionally restricted to one kind.
    pub fn shape_at(
        &self,
        pixel: Point,
        surface: &dyn MapSurface,
        tolerance: f64,
        kind: Option<ShapeKind>,
    ) -> Option<ShapeId> {
        self.z_order.iter().rev().copied().find(|id| {
            self.shapes.get(id).is_some_and(|s| {
                kind.is_none_or(|k| s.kind() == k) && s.hit_test(pixel, surface, tolerance)
            })
        })
    }

    /// Owning shape and index of a vertex.
    pub fn locate_vertex(&self, vertex: VertexId) -> Option<(ShapeId, usize)> {
        self.ordered()
            .find_map(|s| s.vertex_index(vertex).map(|i| (s.id(), i)))
    }

    pub fn shapes_mut(&mut self) -> impl Iterator<Item = &mut Shape> {
        self.shapes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;
    use crate::record::{ShapeRecord, VertexRecord};
    use crate::shapes::ShapeColor;
    use crate::surface::RecordingSurface;

    fn shape(kind: ShapeKind, points: &[(f64, f64)]) -> Shape {
        let record = ShapeRecord {
            kind,
            color: ShapeColor::black(),
            vertices: points
                .iter()
                .map(|&(lat, lng)| VertexRecord { lat, lng, target: None })
                .collect(),
            arrows: false,
            reversed: false,
        };
        Shape::from_record(&record).unwrap()
    }

    #[test]
    fn test_buckets_keep_creation_order() {
        let mut registry = ShapeRegistry::new();
        let a = shape(ShapeKind::Polyline, &[(0.0, 0.0), (0.0, 1.0)]);
        let b = shape(ShapeKind::Polygon, &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let c = shape(ShapeKind::Polyline, &[(2.0, 0.0), (2.0, 1.0)]);
        let (a_id, c_id) = (a.id(), c.id());
        registry.add(a);
        registry.add(b);
        registry.add(c);

        let lines: Vec<_> = registry.of_kind(ShapeKind::Polyline).iter().map(|s| s.id()).collect();
        assert_eq!(lines, vec![a_id, c_id]);
        assert_eq!(registry.last_of_kind(ShapeKind::Polyline), Some(c_id));
        assert_eq!(registry.last_of_kind(ShapeKind::Rectangle), None);

        assert!(registry.remove(c_id).is_some());
        assert!(registry.remove(c_id).is_none());
        assert_eq!(registry.last_of_kind(ShapeKind::Polyline), Some(a_id));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_shape_at_prefers_topmost() {
        let surface = RecordingSurface::new();
        let mut registry = ShapeRegistry::new();
        let below = shape(ShapeKind::Polygon, &[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)]);
        let above = shape(ShapeKind::Polyline, &[(1.0, 0.0), (1.0, 2.0)]);
        let (below_id, above_id) = (below.id(), above.id());
        registry.add(below);
        registry.add(above);

        let pixel = surface.project(LatLng::new(1.0, 1.0));
        assert_eq!(registry.shape_at(pixel, &surface, 2.0, None), Some(above_id));
        assert_eq!(
            registry.shape_at(pixel, &surface, 2.0, Some(ShapeKind::Polygon)),
            Some(below_id)
        );
        let outside = surface.project(LatLng::new(5.0, 5.0));
        assert_eq!(registry.shape_at(outside, &surface, 2.0, None), None);
    }

    #[test]
    fn test_locate_vertex() {
        let mut registry = ShapeRegistry::new();
        let line = shape(ShapeKind::Polyline, &[(0.0, 0.0), (0.0, 1.0)]);
        let (id, vertex) = (line.id(), line.vertices()[1].id());
        registry.add(line);
        assert_eq!(registry.locate_vertex(vertex), Some((id, 1)));
        assert_eq!(registry.locate_vertex(uuid::Uuid::new_v4()), None);
    }
}
