//! Injected editor configuration.
//!
//! Every limit the engine enforces (grid size, zoom range, brush size,
//! history depth, autosave cadence, crash-recovery location) comes from
//! here rather than from constants, so the settings layer can change them.
//!
//! Configuration is plain JSON; every section and field has a default, so
//! a partial file such as `{"history": {"max_depth": 64}}` is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// Grid dimension limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLimits {
    /// Largest allowed width in cells.
    pub max_width: u32,
    /// Largest allowed height in cells.
    pub max_height: u32,
    /// Width of a new grid when none is given.
    pub default_width: u32,
    /// Height of a new grid when none is given.
    pub default_height: u32,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            max_width: 256,
            max_height: 256,
            default_width: 64,
            default_height: 64,
        }
    }
}

impl GridLimits {
    /// Check that `width`x`height` is a legal grid size.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if either side is zero or
    /// above its maximum.
    pub fn check(&self, width: u32, height: u32) -> EditorResult<()> {
        if width == 0 || height == 0 || width > self.max_width || height > self.max_height {
            return Err(EditorError::InvalidDimensions {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

/// Pan and zoom limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Smallest zoom, in screen pixels per cell.
    pub min_zoom: f64,
    /// Largest zoom, in screen pixels per cell.
    pub max_zoom: f64,
    /// Multiplicative factor applied per zoom step.
    pub zoom_step: f64,
    /// Cells that must remain visible on each axis when panning.
    pub min_visible_cells: f64,
    /// Swap the zoom direction of wheel input.
    pub invert_zoom: bool,
    /// Minimap box width in pixels.
    pub minimap_width: f64,
    /// Minimap box height in pixels.
    pub minimap_height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 128.0,
            zoom_step: 1.25,
            min_visible_cells: 1.0,
            invert_zoom: false,
            minimap_width: 256.0,
            minimap_height: 256.0,
        }
    }
}

/// Brush limits and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    /// Largest brush size in cells.
    pub max_size: u32,
    /// Whether the rectangle tool fills its interior by default.
    pub rectangle_filled: bool,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            max_size: 32,
            rectangle_filled: false,
        }
    }
}

/// Undo history limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo entries; `None` keeps everything.
    pub max_depth: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(256),
        }
    }
}

/// Autosave and crash-recovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Seconds between autosave attempts.
    pub autosave_interval_secs: u64,
    /// Directory holding lock markers and crash-recovery copies.
    pub crash_dir: PathBuf,
    /// Directory a never-saved grid is flushed to on clean close.
    pub untitled_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
            crash_dir: default_crash_dir(),
            untitled_dir: PathBuf::from("."),
        }
    }
}

impl PersistenceConfig {
    /// Autosave interval as a [`Duration`].
    #[must_use]
    pub const fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

/// The platform-local recovery directory, falling back to the temp dir.
#[must_use]
pub fn default_crash_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dixel")
        .join("recovery")
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Grid size limits.
    pub grid: GridLimits,
    /// Pan/zoom limits.
    pub viewport: ViewportConfig,
    /// Brush limits.
    pub brush: BrushConfig,
    /// History limits.
    pub history: HistoryConfig,
    /// Autosave and recovery.
    pub persistence: PersistenceConfig,
}

impl EditorConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Serialization`] for malformed JSON and
    /// [`EditorError::Config`] for out-of-range values.
    pub fn from_json_str(json: &str) -> EditorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the file cannot be read, otherwise the
    /// errors of [`EditorConfig::from_json_str`].
    pub fn from_json_file(path: &Path) -> EditorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| EditorError::io(path, e))?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded editor configuration from {}", path.display());
        Ok(config)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] describing the first invalid value.
    pub fn validate(&self) -> EditorResult<()> {
        let grid = &self.grid;
        if grid.max_width == 0 || grid.max_height == 0 {
            return Err(EditorError::Config(
                "Maximum grid dimensions must be > 0".to_string(),
            ));
        }
        if grid.default_width == 0
            || grid.default_height == 0
            || grid.default_width > grid.max_width
            || grid.default_height > grid.max_height
        {
            return Err(EditorError::Config(
                "Default grid dimensions must lie within the maximum".to_string(),
            ));
        }

        let vp = &self.viewport;
        if !(vp.min_zoom > 0.0 && vp.min_zoom.is_finite() && vp.max_zoom.is_finite()) {
            return Err(EditorError::Config(
                "Zoom limits must be positive and finite".to_string(),
            ));
        }
        if vp.min_zoom > vp.max_zoom {
            return Err(EditorError::Config(
                "min_zoom must not exceed max_zoom".to_string(),
            ));
        }
        if !(vp.zoom_step > 1.0 && vp.zoom_step.is_finite()) {
            return Err(EditorError::Config("zoom_step must be > 1".to_string()));
        }
        if !(vp.min_visible_cells >= 0.0 && vp.min_visible_cells.is_finite()) {
            return Err(EditorError::Config(
                "min_visible_cells must be >= 0".to_string(),
            ));
        }
        if vp.minimap_width <= 0.0 || vp.minimap_height <= 0.0 {
            return Err(EditorError::Config(
                "Minimap dimensions must be > 0".to_string(),
            ));
        }

        if self.brush.max_size == 0 {
            return Err(EditorError::Config(
                "Maximum brush size must be > 0".to_string(),
            ));
        }
        if self.history.max_depth == Some(0) {
            return Err(EditorError::Config(
                "History depth must be > 0 (use null for unbounded)".to_string(),
            ));
        }
        if self.persistence.autosave_interval_secs == 0 {
            return Err(EditorError::Config(
                "Autosave interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
