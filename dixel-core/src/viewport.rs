//! Screen ↔ grid coordinate transform with pan, zoom and minimap.
//!
//! ## Model
//!
//! ```text
//!   screen pixel p  ──►  grid coordinate  pan + p / zoom  ──►  cell = floor(..)
//! ```
//!
//! `pan` is the grid-space coordinate shown at the canvas area's top-left
//! pixel and may be fractional, so panning at high zoom moves by less than a
//! cell. `zoom` is the number of screen pixels per cell.
//!
//! [`Viewport::cell_to_screen_rect`] derives each cell's pixel edges from
//! [`Viewport::screen_to_cell`] itself rather than from the inverse formula,
//! so the two are exact inverses up to integer rounding: any pixel maps to a
//! cell whose rectangle contains that pixel, at every pan/zoom state.

use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;
use crate::geometry::{CellPos, GridRect, MinimapRect, ScreenPoint, ScreenRect};

/// A cardinal direction for panning and cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward column 0.
    Left,
    /// Toward the last column.
    Right,
    /// Toward row 0.
    Up,
    /// Toward the last row.
    Down,
}

/// Whether a zoom magnifies or shrinks the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    /// Larger cells.
    In,
    /// Smaller cells.
    Out,
}

impl ZoomDirection {
    /// Map a wheel delta (positive = away from the user) to a direction,
    /// honoring the "invert zoom" preference. Returns `None` for zero.
    #[must_use]
    pub fn from_wheel(delta: f64, invert: bool) -> Option<Self> {
        let dir = if delta > 0.0 {
            Self::In
        } else if delta < 0.0 {
            Self::Out
        } else {
            return None;
        };
        Some(match (dir, invert) {
            (d, false) => d,
            (Self::In, true) => Self::Out,
            (Self::Out, true) => Self::In,
        })
    }
}

/// How far a zoom request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomAmount {
    /// Apply the configured step this many times.
    Steps(u32),
    /// Jump straight to `min_zoom` / `max_zoom`.
    ToLimit,
}

/// How far a keyboard cursor move goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorStep {
    /// Move by this many cells.
    Cells(u32),
    /// Move to the grid edge.
    ToEdge,
}

/// Current pan/zoom state for one canvas area.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    config: ViewportConfig,
    pan_x: f64,
    pan_y: f64,
    zoom: f64,
    screen_width: u32,
    screen_height: u32,
    grid_width: u32,
    grid_height: u32,
}

impl Viewport {
    /// Create a viewport fitted to the window and centered on the grid.
    #[must_use]
    pub fn new(
        config: ViewportConfig,
        screen_width: u32,
        screen_height: u32,
        grid_width: u32,
        grid_height: u32,
    ) -> Self {
        let mut viewport = Self {
            config,
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            screen_width: screen_width.max(1),
            screen_height: screen_height.max(1),
            grid_width: grid_width.max(1),
            grid_height: grid_height.max(1),
        };
        viewport.reset();
        viewport
    }

    /// Fit the whole grid into the window (within zoom limits) and center it.
    pub fn reset(&mut self) {
        let fit = (f64::from(self.screen_width) / f64::from(self.grid_width))
            .min(f64::from(self.screen_height) / f64::from(self.grid_height));
        self.zoom = self.clamp_zoom(fit);
        let (span_x, span_y) = self.visible_cell_span();
        self.pan_x = (f64::from(self.grid_width) - span_x) / 2.0;
        self.pan_y = (f64::from(self.grid_height) - span_y) / 2.0;
        self.clamp_pan();
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Grid-space coordinate at the canvas area's top-left pixel.
    #[must_use]
    pub const fn pan_offset(&self) -> (f64, f64) {
        (self.pan_x, self.pan_y)
    }

    /// Screen pixels per cell.
    #[must_use]
    pub const fn zoom_factor(&self) -> f64 {
        self.zoom
    }

    /// Canvas area size in pixels.
    #[must_use]
    pub const fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    /// Grid size in cells.
    #[must_use]
    pub const fn grid_size(&self) -> (u32, u32) {
        (self.grid_width, self.grid_height)
    }

    /// Number of cells spanned by the canvas area on each axis.
    #[must_use]
    pub fn visible_cell_span(&self) -> (f64, f64) {
        (
            f64::from(self.screen_width) / self.zoom,
            f64::from(self.screen_height) / self.zoom,
        )
    }

    /// Update the canvas area size (window resize); keeps pan and zoom.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_width = width.max(1);
        self.screen_height = height.max(1);
        self.clamp_pan();
    }

    /// Update the grid size after a structural change; keeps pan and zoom.
    pub fn set_grid_size(&mut self, width: u32, height: u32) {
        self.grid_width = width.max(1);
        self.grid_height = height.max(1);
        self.clamp_pan();
    }

    // -----------------------------------------------------------------------
    // Coordinate mapping
    // -----------------------------------------------------------------------

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn axis_cell(&self, pixel: i64, pan: f64) -> i64 {
        (pan + pixel as f64 / self.zoom).floor() as i64
    }

    /// Smallest pixel whose cell is `>= cell` on one axis.
    fn first_pixel(&self, cell: i64, pan: f64) -> i64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let mut p = ((cell as f64 - pan) * self.zoom).ceil() as i64;
        while self.axis_cell(p - 1, pan) >= cell {
            p -= 1;
        }
        while self.axis_cell(p, pan) < cell {
            p += 1;
        }
        p
    }

    /// The cell under a screen pixel. The result may lie outside the grid;
    /// callers check [`crate::PixelGrid::contains`] before using it.
    #[must_use]
    pub fn screen_to_cell(&self, point: ScreenPoint) -> CellPos {
        CellPos::new(
            saturate(self.axis_cell(i64::from(point.x), self.pan_x)),
            saturate(self.axis_cell(i64::from(point.y), self.pan_y)),
        )
    }

    /// The pixel rectangle covered by a cell.
    ///
    /// When a cell is narrower than a pixel (zoom below 1) the rectangle can
    /// be empty: no pixel maps to that cell.
    #[must_use]
    pub fn cell_to_screen_rect(&self, cell: CellPos) -> ScreenRect {
        let left = self.first_pixel(i64::from(cell.x), self.pan_x);
        let right = self.first_pixel(i64::from(cell.x) + 1, self.pan_x);
        let top = self.first_pixel(i64::from(cell.y), self.pan_y);
        let bottom = self.first_pixel(i64::from(cell.y) + 1, self.pan_y);
        ScreenRect::new(
            saturate(left),
            saturate(top),
            saturate(right - left),
            saturate(bottom - top),
        )
    }

    /// The pixel at the middle of a cell, for warping a keyboard cursor.
    #[must_use]
    pub fn cell_center(&self, cell: CellPos) -> ScreenPoint {
        let rect = self.cell_to_screen_rect(cell);
        ScreenPoint::new(rect.x + rect.width / 2, rect.y + rect.height / 2)
    }

    /// Cells at least partly visible, clipped to the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn visible_cells(&self) -> GridRect {
        let (span_x, span_y) = self.visible_cell_span();
        let clip = |pan: f64, span: f64, limit: u32| -> (u32, u32) {
            let start = pan.floor().clamp(0.0, f64::from(limit)) as u32;
            let end = (pan + span).ceil().clamp(0.0, f64::from(limit)) as u32;
            (start, end.max(start))
        };
        let (x0, x1) = clip(self.pan_x, span_x, self.grid_width);
        let (y0, y1) = clip(self.pan_y, span_y, self.grid_height);
        GridRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    // -----------------------------------------------------------------------
    // Pan
    // -----------------------------------------------------------------------

    /// Keep at least `min_visible_cells` (bounded by the grid and the view)
    /// of the grid on screen on each axis.
    fn clamp_pan(&mut self) {
        let (span_x, span_y) = self.visible_cell_span();
        let keep = self.config.min_visible_cells;
        self.pan_x = clamp_axis(self.pan_x, span_x, f64::from(self.grid_width), keep);
        self.pan_y = clamp_axis(self.pan_y, span_y, f64::from(self.grid_height), keep);
    }

    /// Move the view by a screen-pixel delta; positive values reveal cells
    /// to the right/bottom.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx / self.zoom;
        self.pan_y += dy / self.zoom;
        self.clamp_pan();
    }

    /// Jump to the grid edge in `direction`.
    pub fn pan_to_cell_limit(&mut self, direction: Direction) {
        let (span_x, span_y) = self.visible_cell_span();
        match direction {
            Direction::Left => self.pan_x = 0.0,
            Direction::Right => self.pan_x = f64::from(self.grid_width) - span_x,
            Direction::Up => self.pan_y = 0.0,
            Direction::Down => self.pan_y = f64::from(self.grid_height) - span_y,
        }
        self.clamp_pan();
    }

    /// Scroll just enough to bring `cell` fully on screen.
    pub fn ensure_visible(&mut self, cell: CellPos) {
        let (span_x, span_y) = self.visible_cell_span();
        let (cx, cy) = (f64::from(cell.x), f64::from(cell.y));
        if cx < self.pan_x {
            self.pan_x = cx;
        } else if cx + 1.0 > self.pan_x + span_x {
            self.pan_x = cx + 1.0 - span_x;
        }
        if cy < self.pan_y {
            self.pan_y = cy;
        } else if cy + 1.0 > self.pan_y + span_y {
            self.pan_y = cy + 1.0 - span_y;
        }
        self.clamp_pan();
    }

    /// Move a keyboard cursor and scroll to keep it visible.
    ///
    /// The cursor is clamped to the grid.
    pub fn step_cursor(&mut self, cell: CellPos, direction: Direction, step: CursorStep) -> CellPos {
        let max_x = saturate(i64::from(self.grid_width) - 1);
        let max_y = saturate(i64::from(self.grid_height) - 1);
        let n = match step {
            CursorStep::Cells(n) => saturate(i64::from(n)),
            CursorStep::ToEdge => i32::MAX,
        };
        let moved = match direction {
            Direction::Left => CellPos::new(cell.x.saturating_sub(n), cell.y),
            Direction::Right => CellPos::new(cell.x.saturating_add(n), cell.y),
            Direction::Up => CellPos::new(cell.x, cell.y.saturating_sub(n)),
            Direction::Down => CellPos::new(cell.x, cell.y.saturating_add(n)),
        };
        let clamped = CellPos::new(moved.x.clamp(0, max_x), moved.y.clamp(0, max_y));
        self.ensure_visible(clamped);
        clamped
    }

    // -----------------------------------------------------------------------
    // Zoom
    // -----------------------------------------------------------------------

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.config.min_zoom, self.config.max_zoom)
    }

    /// Zoom while keeping `anchor` over the same grid cell.
    ///
    /// Returns `true` if the zoom factor changed.
    pub fn zoom_at(&mut self, anchor: ScreenPoint, direction: ZoomDirection, amount: ZoomAmount) -> bool {
        let target = match (direction, amount) {
            (ZoomDirection::In, ZoomAmount::ToLimit) => self.config.max_zoom,
            (ZoomDirection::Out, ZoomAmount::ToLimit) => self.config.min_zoom,
            (ZoomDirection::In, ZoomAmount::Steps(n)) => {
                self.zoom * self.config.zoom_step.powi(saturate(i64::from(n)))
            }
            (ZoomDirection::Out, ZoomAmount::Steps(n)) => {
                self.zoom / self.config.zoom_step.powi(saturate(i64::from(n)))
            }
        };
        let new_zoom = self.clamp_zoom(target);
        if (new_zoom - self.zoom).abs() <= f64::EPSILON * self.zoom {
            return false;
        }

        let (ax, ay) = (f64::from(anchor.x), f64::from(anchor.y));
        let gx = self.pan_x + ax / self.zoom;
        let gy = self.pan_y + ay / self.zoom;
        self.zoom = new_zoom;
        self.pan_x = gx - ax / new_zoom;
        self.pan_y = gy - ay / new_zoom;
        self.clamp_pan();

        tracing::debug!(zoom = self.zoom, "Zoomed around ({}, {})", anchor.x, anchor.y);
        true
    }

    // -----------------------------------------------------------------------
    // Minimap
    // -----------------------------------------------------------------------

    /// Minimap pixels per cell; cells stay square.
    #[must_use]
    pub fn minimap_scale(&self) -> f64 {
        (self.config.minimap_width / f64::from(self.grid_width))
            .min(self.config.minimap_height / f64::from(self.grid_height))
    }

    /// Size of the drawn minimap.
    #[must_use]
    pub fn minimap_size(&self) -> (f64, f64) {
        let scale = self.minimap_scale();
        (
            f64::from(self.grid_width) * scale,
            f64::from(self.grid_height) * scale,
        )
    }

    /// The visible grid region, clipped to the grid, in minimap coordinates.
    #[must_use]
    pub fn minimap_rect(&self) -> MinimapRect {
        let scale = self.minimap_scale();
        let (span_x, span_y) = self.visible_cell_span();
        let x0 = self.pan_x.clamp(0.0, f64::from(self.grid_width));
        let x1 = (self.pan_x + span_x).clamp(0.0, f64::from(self.grid_width));
        let y0 = self.pan_y.clamp(0.0, f64::from(self.grid_height));
        let y1 = (self.pan_y + span_y).clamp(0.0, f64::from(self.grid_height));
        MinimapRect {
            x: x0 * scale,
            y: y0 * scale,
            width: (x1 - x0) * scale,
            height: (y1 - y0) * scale,
        }
    }
}

fn clamp_axis(pan: f64, span: f64, grid: f64, keep: f64) -> f64 {
    let keep = keep.min(grid).min(span);
    let lo = keep - span;
    let hi = grid - keep;
    pan.clamp(lo, hi)
}

#[allow(clippy::cast_possible_truncation)]
fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
