//! GeoDraft Core Library
//!
//! Interactive drawing and editing of vector shapes (polygons, rectangles,
//! polylines) on a map surface. Rendering and event delivery belong to the
//! host, which implements [`MapSurface`].

pub mod config;
pub mod controller;
pub mod geo;
pub mod input;
pub mod record;
pub mod registry;
pub mod shapes;
pub mod snap;
pub mod surface;
pub mod tools;
pub mod vertex;

pub use config::{ConfigError, EngineConfig};
pub use controller::{DrawingController, HoveredVertex, Session};
pub use geo::{Corner, LatLng, LatLngBounds, LatLngDelta};
pub use input::{MapEvent, MapEventKind, Modifiers, PointerSource};
pub use record::{RecordError, ShapeRecord, VertexRecord, records_from_json, records_to_json};
pub use registry::ShapeRegistry;
pub use shapes::{ArrowState, ChangeEvent, Shape, ShapeColor, ShapeId, ShapeKind};
pub use snap::{SnapResult, SnapSource, axis_snap, mousemove_delta};
pub use surface::{MapSurface, PathKind, PathPrimitive, RecordingSurface};
pub use tools::DrawCommand;
pub use vertex::{TargetId, Vertex, VertexId, VertexLinks};
