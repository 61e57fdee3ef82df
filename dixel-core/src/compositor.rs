//! Data handed to the renderer each frame.
//!
//! Rendering itself lives outside this crate. A [`Compositor`] receives a
//! [`FrameView`] that borrows the grid and viewport and answers everything
//! a frame needs: which cells are visible, where each one lands on screen,
//! the cursor overlay, the minimap indicator and the center guides.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::{CellPos, GridRect, MinimapRect, ScreenRect};
use crate::grid::PixelGrid;
use crate::viewport::Viewport;

/// Screen position of the grid's center lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterGuides {
    /// Screen x of the vertical center line.
    pub x: f64,
    /// Screen y of the horizontal center line.
    pub y: f64,
}

/// A visible cell ready to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPaint {
    /// The cell.
    pub pos: CellPos,
    /// Its on-screen rectangle.
    pub rect: ScreenRect,
    /// Its color.
    pub color: Color,
}

/// Read-only view of one frame.
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    grid: &'a PixelGrid,
    viewport: &'a Viewport,
    cursor: Vec<CellPos>,
    show_center: bool,
}

impl<'a> FrameView<'a> {
    /// Build a frame view.
    #[must_use]
    pub fn new(grid: &'a PixelGrid, viewport: &'a Viewport, cursor: Vec<CellPos>, show_center: bool) -> Self {
        Self {
            grid,
            viewport,
            cursor,
            show_center,
        }
    }

    /// The grid.
    #[must_use]
    pub const fn grid(&self) -> &'a PixelGrid {
        self.grid
    }

    /// The viewport.
    #[must_use]
    pub const fn viewport(&self) -> &'a Viewport {
        self.viewport
    }

    /// Cells at least partly on screen.
    #[must_use]
    pub fn visible_cells(&self) -> GridRect {
        self.viewport.visible_cells()
    }

    /// Every visible cell with its screen rectangle and color, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellPaint> + '_ {
        let visible = self.visible_cells();
        let viewport = self.viewport;
        let grid = self.grid;
        visible.cells().filter_map(move |pos| {
            let color = grid.get(pos).ok()?;
            Some(CellPaint {
                pos,
                rect: viewport.cell_to_screen_rect(pos),
                color,
            })
        })
    }

    /// Cells under the brush cursor (including mirror images).
    #[must_use]
    pub fn cursor_cells(&self) -> &[CellPos] {
        &self.cursor
    }

    /// Screen rectangles of the cursor cells.
    pub fn cursor_rects(&self) -> impl Iterator<Item = ScreenRect> + '_ {
        self.cursor
            .iter()
            .map(|&pos| self.viewport.cell_to_screen_rect(pos))
    }

    /// The minimap's visible-region indicator.
    #[must_use]
    pub fn minimap_rect(&self) -> MinimapRect {
        self.viewport.minimap_rect()
    }

    /// Screen position of the grid center lines, when enabled.
    #[must_use]
    pub fn center_guides(&self) -> Option<CenterGuides> {
        if !self.show_center {
            return None;
        }
        let (pan_x, pan_y) = self.viewport.pan_offset();
        let zoom = self.viewport.zoom_factor();
        let (w, h) = self.viewport.grid_size();
        Some(CenterGuides {
            x: (f64::from(w) / 2.0 - pan_x) * zoom,
            y: (f64::from(h) / 2.0 - pan_y) * zoom,
        })
    }
}

/// Renders frames. Implemented by the UI layer.
pub trait Compositor {
    /// Draw one frame.
    fn render(&mut self, frame: &FrameView<'_>);
}
