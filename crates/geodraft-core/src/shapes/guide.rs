//! Transient preview lines shown while drawing.

use super::ShapeColor;
use crate::geo::LatLng;
use crate::surface::{LayerId, MapSurface, PathPrimitive};

/// A preview path owned by a draft shape.
///
/// The owner must call [`GuideLine::release`] on every exit path; the
/// shapes do so from `release_guides`, which runs on commit, cancel and
/// discard alike.
#[derive(Debug, Default)]
pub struct GuideLine {
    layer: Option<LayerId>,
}

impl GuideLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw or update the guide through the given coordinates.
    pub fn draw(&mut self, coordinates: Vec<LatLng>, color: ShapeColor, surface: &mut dyn MapSurface) {
        let path = PathPrimitive::guide(coordinates, color);
        match self.layer {
            Some(layer) => surface.update_path(layer, &path),
            None => self.layer = Some(surface.add_path(&path)),
        }
    }

    pub fn release(&mut self, surface: &mut dyn MapSurface) {
        if let Some(layer) = self.layer.take() {
            surface.remove_layer(layer);
        }
    }

    pub fn is_active(&self) -> bool {
        self.layer.is_some()
    }
}
