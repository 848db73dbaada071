//! Replays a session script against an in-memory map.

use crate::AppError;
use geodraft_core::{
    DrawCommand, DrawingController, EngineConfig, LatLng, MapEvent, Modifiers,
    RecordingSurface, ShapeRecord,
};
use serde::Deserialize;
use std::path::Path;

/// A marker placed on the map before the script runs.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerSpec {
    pub target: String,
    pub lat: f64,
    pub lng: f64,
}

/// Drag a committed shape's vertex handle, addressed by position.
#[derive(Debug, Clone, Deserialize)]
pub struct HandleDrag {
    /// Index in creation order.
    pub shape: usize,
    pub vertex: usize,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub shift: bool,
}

/// One scripted input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Command(DrawCommand),
    Event(MapEvent),
    DragHandle { drag_handle: HandleDrag },
}

/// A recorded drawing session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub config: Option<EngineConfig>,
    pub markers: Vec<MarkerSpec>,
    /// Shapes present before the first step.
    pub records: Vec<ShapeRecord>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Drives a controller over a recording surface.
pub struct Runner {
    pub controller: DrawingController,
    pub surface: RecordingSurface,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            controller: DrawingController::new(config),
            surface: RecordingSurface::new(),
        }
    }

    /// Apply the script and return the committed shapes.
    pub fn run(&mut self, script: &Script) -> Result<Vec<ShapeRecord>, AppError> {
        for marker in &script.markers {
            self.surface
                .add_marker(marker.target.clone(), LatLng::new(marker.lat, marker.lng));
        }
        if !script.records.is_empty() {
            self.controller.load_records(&script.records, &mut self.surface);
        }
        for (index, step) in script.steps.iter().enumerate() {
            log::debug!("Step {index}: {step:?}");
            self.apply(step)?;
        }
        for change in self.controller.drain_changes() {
            log::info!("{change:?}");
        }
        Ok(self.controller.records())
    }

    fn apply(&mut self, step: &Step) -> Result<(), AppError> {
        match step {
            Step::Command(command) => self.controller.dispatch(*command, &mut self.surface),
            Step::Event(event) => self.controller.handle_event(event.clone(), &mut self.surface),
            Step::DragHandle { drag_handle } => {
                let vertex = self
                    .controller
                    .shapes()
                    .ids()
                    .get(drag_handle.shape)
                    .and_then(|&id| self.controller.shape(id))
                    .and_then(|shape| shape.vertices().get(drag_handle.vertex))
                    .map(|v| v.id())
                    .ok_or(AppError::UnknownHandle {
                        shape: drag_handle.shape,
                        vertex: drag_handle.vertex,
                    })?;
                let modifiers = Modifiers {
                    shift: drag_handle.shift,
                    ..Modifiers::NONE
                };
                let event = MapEvent::HandleDrag {
                    vertex,
                    latlng: LatLng::new(drag_handle.lat, drag_handle.lng),
                    modifiers,
                };
                self.controller.handle_event(event, &mut self.surface);
            }
        }
        Ok(())
    }
}
