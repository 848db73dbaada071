//! Pointer and map events delivered by the map surface.

use crate::geo::LatLng;
use crate::vertex::{TargetId, VertexId};
use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };
}

/// Where a pointer move came from. Touch moves are handled exactly like mouse moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSource {
    #[default]
    Mouse,
    Touch,
}

/// Event kinds a listener can subscribe to on the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapEventKind {
    Click,
    MouseMove,
    TouchMove,
}

/// Listener set installed while a draft shape is being drawn.
pub const DRAWING_EVENTS: [MapEventKind; 3] = [
    MapEventKind::Click,
    MapEventKind::MouseMove,
    MapEventKind::TouchMove,
];

/// An event delivered by the map surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    Click {
        latlng: LatLng,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        latlng: LatLng,
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        source: PointerSource,
    },
    PointerDown {
        latlng: LatLng,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        latlng: LatLng,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// A vertex handle was dragged to a new position.
    HandleDrag {
        vertex: VertexId,
        latlng: LatLng,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// An external marker was dragged.
    MarkerDrag { target: TargetId, latlng: LatLng },
    /// An external marker was deleted.
    MarkerRemoved { target: TargetId },
    /// The drawing pane now exists.
    PaneReady,
}

impl MapEvent {
    /// Convenience constructor for a plain click.
    pub fn click(lat: f64, lng: f64) -> Self {
        MapEvent::Click {
            latlng: LatLng::new(lat, lng),
            modifiers: Modifiers::NONE,
        }
    }

    /// Convenience constructor for a plain mouse move.
    pub fn mouse_move(lat: f64, lng: f64) -> Self {
        MapEvent::PointerMove {
            latlng: LatLng::new(lat, lng),
            modifiers: Modifiers::NONE,
            source: PointerSource::Mouse,
        }
    }
}
