//! Active tool, brush size, paint color and mirror flags.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::BrushConfig;
use crate::geometry::CellPos;

/// The drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Paint the brush footprint.
    #[default]
    Pencil,
    /// Clear the brush footprint to transparent.
    Eraser,
    /// Flood fill.
    Bucket,
    /// Sample a cell color.
    Eyedropper,
    /// Straight line between drag start and end.
    Line,
    /// Rectangle spanned by drag start and end.
    Rectangle,
}

impl ToolKind {
    /// Short label used for history entries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pencil => "pencil",
            Self::Eraser => "eraser",
            Self::Bucket => "fill",
            Self::Eyedropper => "eyedropper",
            Self::Line => "line",
            Self::Rectangle => "rectangle",
        }
    }
}

/// Which cells the bucket tool replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// The 4-connected region around the start cell.
    #[default]
    Contiguous,
    /// Every cell in the grid with the start cell's color.
    SameColor,
}

/// Tool settings that persist across strokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrushState {
    tool: ToolKind,
    size: u32,
    max_size: u32,
    color: Color,
    /// Mirror writes across the vertical midline (`x -> width - 1 - x`).
    pub mirror_horizontal: bool,
    /// Mirror writes across the horizontal midline (`y -> height - 1 - y`).
    pub mirror_vertical: bool,
    /// Rectangle tool fills its interior.
    pub rectangle_filled: bool,
    /// Bucket tool region rule.
    pub fill_mode: FillMode,
}

impl BrushState {
    /// A size-1 black pencil with the configured limits.
    #[must_use]
    pub fn new(config: &BrushConfig) -> Self {
        Self {
            tool: ToolKind::default(),
            size: 1,
            max_size: config.max_size.max(1),
            color: Color::BLACK,
            mirror_horizontal: false,
            mirror_vertical: false,
            rectangle_filled: config.rectangle_filled,
            fill_mode: FillMode::default(),
        }
    }

    /// The active tool.
    #[must_use]
    pub const fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Select a tool.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    /// Brush size in cells.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Set the brush size, clamped to `[1, max_size]`. Returns the size applied.
    pub fn set_size(&mut self, size: u32) -> u32 {
        self.size = size.clamp(1, self.max_size);
        self.size
    }

    /// Grow or shrink the brush by `delta` cells.
    pub fn adjust_size(&mut self, delta: i32) -> u32 {
        let size = i64::from(self.size) + i64::from(delta);
        self.set_size(u32::try_from(size.max(1)).unwrap_or(self.max_size))
    }

    /// The paint color.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Set the paint color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// The color a stroke writes: transparent for the eraser.
    #[must_use]
    pub const fn stroke_color(&self) -> Color {
        match self.tool {
            ToolKind::Eraser => Color::TRANSPARENT,
            _ => self.color,
        }
    }

    /// Whether any mirror flag is set.
    #[must_use]
    pub const fn is_mirrored(&self) -> bool {
        self.mirror_horizontal || self.mirror_vertical
    }

    /// The square brush footprint around `target`.
    ///
    /// The top-left cell is `target - size / 2`, so odd sizes are centered
    /// and even sizes extend one cell further toward the top-left.
    pub fn footprint(&self, target: CellPos) -> impl Iterator<Item = CellPos> {
        let size = i32::try_from(self.size).unwrap_or(1);
        let origin = target.offset(-(size / 2), -(size / 2));
        (0..size).flat_map(move |dy| (0..size).map(move |dx| origin.offset(dx, dy)))
    }
}

impl Default for BrushState {
    fn default() -> Self {
        Self::new(&BrushConfig::default())
    }
}
