//! Tool-selection commands.

use crate::controller::DrawingController;
use crate::shapes::{ShapeColor, ShapeKind};
use crate::surface::MapSurface;
use serde::{Deserialize, Serialize};

/// A discrete command from the drawing toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DrawCommand {
    SelectPolygon,
    SelectRectangle,
    SelectPolyline,
    ToggleColor,
    ToggleDelete,
    ToggleArrows,
    Complete,
    Undo,
    Cancel,
    Done,
    SetColor { color: ShapeColor },
}

impl DrawCommand {
    /// The shape kind a select command starts drawing.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            DrawCommand::SelectPolygon => Some(ShapeKind::Polygon),
            DrawCommand::SelectRectangle => Some(ShapeKind::Rectangle),
            DrawCommand::SelectPolyline => Some(ShapeKind::Polyline),
            _ => None,
        }
    }
}

impl DrawingController {
    /// Run a toolbar command.
    pub fn dispatch(&mut self, command: DrawCommand, surface: &mut dyn MapSurface) {
        log::debug!("Command {:?}", command);
        if let Some(kind) = command.shape_kind() {
            self.new_shape(kind, surface);
            return;
        }
        match command {
            DrawCommand::ToggleColor => self.toggle_color(surface),
            DrawCommand::ToggleDelete => self.toggle_delete(surface),
            DrawCommand::ToggleArrows => self.toggle_arrows(surface),
            DrawCommand::Complete => {
                self.complete(surface);
            }
            DrawCommand::Undo => {
                self.undo(surface);
            }
            DrawCommand::Cancel => self.cancel(surface),
            DrawCommand::Done => {
                self.done(surface);
            }
            DrawCommand::SetColor { color } => self.set_color(color),
            DrawCommand::SelectPolygon | DrawCommand::SelectRectangle | DrawCommand::SelectPolyline => {}
        }
    }
}
