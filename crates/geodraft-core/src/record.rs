//! Persisted form of committed shapes.

use crate::geo::LatLng;
use crate::shapes::{
    ArrowState, Polygon, Polyline, Rectangle, Shape, ShapeColor, ShapeCore, ShapeKind,
};
use crate::vertex::{TargetId, Vertex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors rebuilding shapes from records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{kind} needs at least {min} vertices, got {count}")]
    TooFewVertices {
        kind: ShapeKind,
        min: usize,
        count: usize,
    },
    #[error("Rectangle needs exactly 4 vertices, got {0}")]
    RectangleCorners(usize),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub lat: f64,
    pub lng: f64,
    /// Marker this vertex mirrors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetId>,
}

/// Everything a shape needs to survive a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub kind: ShapeKind,
    pub color: ShapeColor,
    pub vertices: Vec<VertexRecord>,
    /// Polyline arrow decoration.
    #[serde(default, skip_serializing_if = "is_false")]
    pub arrows: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reversed: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ShapeRecord {
    pub fn positions(&self) -> Vec<LatLng> {
        self.vertices.iter().map(|v| LatLng::new(v.lat, v.lng)).collect()
    }

    pub fn arrow_state(&self) -> ArrowState {
        match (self.arrows, self.reversed) {
            (false, _) => ArrowState::None,
            (true, false) => ArrowState::Forward,
            (true, true) => ArrowState::Reversed,
        }
    }

    /// Check the kind's commit invariant.
    pub fn validate(&self) -> Result<(), RecordError> {
        let count = self.vertices.len();
        let min = match self.kind {
            ShapeKind::Polygon => Polygon::MIN_VERTICES,
            ShapeKind::Polyline => Polyline::MIN_VERTICES,
            ShapeKind::Rectangle if count != Rectangle::CORNERS => {
                return Err(RecordError::RectangleCorners(count));
            }
            ShapeKind::Rectangle => Rectangle::CORNERS,
        };
        if count < min {
            return Err(RecordError::TooFewVertices {
                kind: self.kind,
                min,
                count,
            });
        }
        Ok(())
    }
}

impl Shape {
    pub fn to_record(&self) -> ShapeRecord {
        let arrows = self.as_polyline().map(Polyline::arrow_state).unwrap_or_default();
        ShapeRecord {
            kind: self.kind(),
            color: self.color(),
            vertices: self
                .vertices()
                .iter()
                .map(|v| VertexRecord {
                    lat: v.position().lat,
                    lng: v.position().lng,
                    target: v.target().cloned(),
                })
                .collect(),
            arrows: arrows != ArrowState::None,
            reversed: arrows == ArrowState::Reversed,
        }
    }

    /// Rebuild a shape. The result is not rendered yet and its vertex
    /// handles are hidden.
    pub fn from_record(record: &ShapeRecord) -> Result<Shape, RecordError> {
        record.validate()?;
        let mut core = ShapeCore::new(record.color);
        let parent = core.id;
        core.vertices = record
            .vertices
            .iter()
            .map(|v| Vertex::new(LatLng::new(v.lat, v.lng), parent).with_target(v.target.clone()))
            .collect();
        Ok(match record.kind {
            ShapeKind::Polygon => Shape::Polygon(Polygon::from_core(core)),
            ShapeKind::Rectangle => Shape::Rectangle(Rectangle::from_core(core)),
            ShapeKind::Polyline => {
                let mut line = Polyline::from_core(core);
                line.init_arrows(record.arrow_state());
                Shape::Polyline(line)
            }
        })
    }
}

pub fn records_to_json(records: &[ShapeRecord]) -> Result<String, RecordError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn records_from_json(json: &str) -> Result<Vec<ShapeRecord>, RecordError> {
    Ok(serde_json::from_str(json)?)
}
