//! Point snapping for drawing and dragging.

use crate::geo::{LatLng, LatLngDelta};
use crate::input::Modifiers;
use crate::surface::MarkerHit;
use crate::vertex::{TargetId, VertexId};
use kurbo::Point;

/// What the accepted point was snapped to.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapSource {
    /// Raw pointer coordinate.
    Free,
    /// Constrained to the dominant axis from a reference point.
    Axis,
    /// Exactly on another vertex.
    Vertex(VertexId),
    /// Exactly on an external marker.
    Marker(TargetId),
}

/// Result of a snap operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: LatLng,
    pub source: SnapSource,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: LatLng) -> Self {
        Self {
            point,
            source: SnapSource::Free,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.source != SnapSource::Free
    }

    pub fn vertex(&self) -> Option<VertexId> {
        match self.source {
            SnapSource::Vertex(id) => Some(id),
            _ => None,
        }
    }

    pub fn marker(&self) -> Option<&TargetId> {
        match &self.source {
            SnapSource::Marker(target) => Some(target),
            _ => None,
        }
    }
}

/// Pointer state resolved by the controller for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerContext {
    pub latlng: LatLng,
    pub pixel: Point,
    pub modifiers: Modifiers,
    /// Nearest visible vertex under the pointer, with its position.
    pub hovered_vertex: Option<(VertexId, LatLng)>,
    /// Marker under the pointer.
    pub hovered_marker: Option<MarkerHit>,
}

impl PointerContext {
    /// Context with nothing hovered.
    pub fn bare(latlng: LatLng, modifiers: Modifiers) -> Self {
        Self {
            latlng,
            pixel: Point::ZERO,
            modifiers,
            hovered_vertex: None,
            hovered_marker: None,
        }
    }
}

/// Constrain `candidate` to the dominant axis measured from `reference`.
///
/// The axis with the larger absolute delta stays free; the other is pinned
/// to the reference value.
pub fn axis_snap(candidate: LatLng, reference: LatLng) -> LatLng {
    let d_lat = (candidate.lat - reference.lat).abs();
    let d_lng = (candidate.lng - reference.lng).abs();
    if d_lat > d_lng {
        LatLng::new(candidate.lat, reference.lng)
    } else {
        LatLng::new(reference.lat, candidate.lng)
    }
}

/// Delta from `reference` to `candidate`, axis-constrained when shift is held.
pub fn mousemove_delta(candidate: LatLng, reference: LatLng, modifiers: Modifiers) -> LatLngDelta {
    let accepted = if modifiers.shift {
        axis_snap(candidate, reference)
    } else {
        candidate
    };
    accepted - reference
}

/// Resolve the location the next vertex would land on.
///
/// Without shift: a hovered vertex wins, then a hovered marker, then the raw
/// pointer. With shift: the pointer is axis-constrained from `anchor`.
pub fn resolve_pointer(pointer: &PointerContext, anchor: Option<LatLng>) -> SnapResult {
    if pointer.modifiers.shift {
        return match anchor {
            Some(anchor) => SnapResult {
                point: axis_snap(pointer.latlng, anchor),
                source: SnapSource::Axis,
            },
            None => SnapResult::none(pointer.latlng),
        };
    }
    if let Some((id, at)) = pointer.hovered_vertex {
        return SnapResult {
            point: at,
            source: SnapSource::Vertex(id),
        };
    }
    if let Some(marker) = &pointer.hovered_marker {
        return SnapResult {
            point: marker.latlng,
            source: SnapSource::Marker(marker.target.clone()),
        };
    }
    SnapResult::none(pointer.latlng)
}
