//! Engine configuration.

use crate::shapes::ShapeColor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for the drawing engine. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Color of new shapes until a color is picked.
    pub default_color: ShapeColor,
    /// Pixel radius within which a vertex counts as hovered.
    pub vertex_hover_tolerance: f64,
    /// Pixel tolerance for clicking a polyline or a shape edge.
    pub shape_hit_tolerance: f64,
    /// Fill opacity of polygons and rectangles.
    pub polygon_fill_opacity: f64,
    /// Id of the shared arrow glyph on the drawing pane.
    pub arrow_glyph_id: String,
    /// Start a new rectangle draft right after one is completed.
    pub chain_rectangles: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_color: ShapeColor::new(0x33, 0x88, 0xff, 0xff),
            vertex_hover_tolerance: 10.0,
            shape_hit_tolerance: 6.0,
            polygon_fill_opacity: 0.2,
            arrow_glyph_id: "geodraft-arrow".to_string(),
            chain_rectangles: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Default config file location.
    ///
    /// On Unix: `~/.config/geodraft/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("geodraft").join("config.json"))
    }

    /// Load from the default location, falling back to defaults if absent.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}
