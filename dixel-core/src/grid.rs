//! The pixel grid: the single source of truth for image content.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::GridLimits;
use crate::error::{EditorError, EditorResult};
use crate::geometry::{CellPos, GridRect};

/// Which part of the old grid stays in place when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAnchor {
    /// Keep the top-left corner.
    #[default]
    TopLeft,
    /// Keep the top edge, centered horizontally.
    Top,
    /// Keep the top-right corner.
    TopRight,
    /// Keep the left edge, centered vertically.
    Left,
    /// Keep the center.
    Center,
    /// Keep the right edge, centered vertically.
    Right,
    /// Keep the bottom-left corner.
    BottomLeft,
    /// Keep the bottom edge, centered horizontally.
    Bottom,
    /// Keep the bottom-right corner.
    BottomRight,
}

impl ResizeAnchor {
    /// Offset of the old content inside the new grid along one axis.
    fn offset(old: u32, new: u32, axis_factor: u8) -> i64 {
        let delta = i64::from(new) - i64::from(old);
        match axis_factor {
            0 => 0,
            1 => delta / 2,
            _ => delta,
        }
    }

    /// Horizontal and vertical alignment factors (0 = start, 1 = center, 2 = end).
    const fn factors(self) -> (u8, u8) {
        match self {
            Self::TopLeft => (0, 0),
            Self::Top => (1, 0),
            Self::TopRight => (2, 0),
            Self::Left => (0, 1),
            Self::Center => (1, 1),
            Self::Right => (2, 1),
            Self::BottomLeft => (0, 2),
            Self::Bottom => (1, 2),
            Self::BottomRight => (2, 2),
        }
    }
}

/// Direction of a whole-grid rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateDirection {
    /// 90 degrees clockwise.
    Clockwise,
    /// 90 degrees counter-clockwise.
    CounterClockwise,
    /// 180 degrees.
    Half,
}

/// Axis of a whole-grid mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    /// Swap left and right.
    Horizontal,
    /// Swap top and bottom.
    Vertical,
}

/// Outcome of writing a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWrite {
    /// The value the cell held before the write.
    pub old: Color,
    /// Whether the value actually changed.
    pub changed: bool,
}

/// A fixed-size row-major grid of colored cells.
///
/// Every coordinate in `[0, width) x [0, height)` holds a value. Structural
/// operations (resize, crop, rotate, flip) return a new grid instead of
/// mutating across a size change.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    cells: Vec<Color>,
    dirty: bool,
}

impl PartialEq for PixelGrid {
    /// Grids compare by content; the dirty flag is bookkeeping.
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }
}

impl Eq for PixelGrid {}

impl PixelGrid {
    /// Create a transparent grid.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if the size is outside `limits`.
    pub fn new(width: u32, height: u32, limits: &GridLimits) -> EditorResult<Self> {
        Self::filled(width, height, Color::TRANSPARENT, limits)
    }

    /// Create a grid with every cell set to `color`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if the size is outside `limits`.
    pub fn filled(width: u32, height: u32, color: Color, limits: &GridLimits) -> EditorResult<Self> {
        limits.check(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![color; cell_count(width, height)],
            dirty: false,
        })
    }

    /// Build a grid from a decoded RGBA8 buffer.
    ///
    /// The grid is either fully built or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if the size is outside
    /// `limits`, or [`EditorError::CorruptSource`] if the buffer length does
    /// not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8], limits: &GridLimits) -> EditorResult<Self> {
        limits.check(width, height)?;
        let expected = cell_count(width, height) * 4;
        if bytes.len() != expected {
            return Err(EditorError::corrupt(
                "<memory>",
                format!(
                    "expected {expected} bytes for {width}x{height} RGBA, got {}",
                    bytes.len()
                ),
            ));
        }
        let cells = bytes
            .chunks_exact(4)
            .map(|px| Color::from_bytes([px[0], px[1], px[2], px[3]]))
            .collect();
        Ok(Self {
            width,
            height,
            cells,
            dirty: false,
        })
    }

    /// Flatten to an RGBA8 buffer for the codec.
    #[must_use]
    pub fn to_rgba(&self) -> Vec<u8> {
        self.cells.iter().flat_map(|c| c.to_bytes()).collect()
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The full extent as a rectangle.
    #[must_use]
    pub const fn bounds(&self) -> GridRect {
        GridRect::new(0, 0, self.width, self.height)
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    /// Whether the grid has mutations since it was last marked clean.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the grid as changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag after a successful save.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Whether the cell lies inside the grid.
    #[must_use]
    pub fn contains(&self, pos: CellPos) -> bool {
        self.bounds().contains(pos)
    }

    #[allow(clippy::cast_sign_loss)]
    fn index(&self, pos: CellPos) -> EditorResult<usize> {
        if !self.contains(pos) {
            return Err(EditorError::OutOfBounds {
                x: i64::from(pos.x),
                y: i64::from(pos.y),
                width: self.width,
                height: self.height,
            });
        }
        Ok(pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Read a cell.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfBounds`] if `pos` is outside the grid.
    pub fn get(&self, pos: CellPos) -> EditorResult<Color> {
        let idx = self.index(pos)?;
        Ok(self.cells[idx])
    }

    /// Write a cell and return its previous value.
    ///
    /// Writing the value a cell already holds reports `changed: false` and
    /// leaves the dirty flag alone.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfBounds`] if `pos` is outside the grid.
    pub fn set(&mut self, pos: CellPos, color: Color) -> EditorResult<CellWrite> {
        let idx = self.index(pos)?;
        let old = std::mem::replace(&mut self.cells[idx], color);
        let changed = old != color;
        if changed {
            self.dirty = true;
        }
        Ok(CellWrite { old, changed })
    }

    /// A same-sized copy with every cell set to `color`.
    #[must_use]
    pub fn fill_all(&self, color: Color) -> Self {
        Self {
            width: self.width,
            height: self.height,
            cells: vec![color; self.cells.len()],
            dirty: true,
        }
    }

    /// Hash of dimensions and content, used to detect saves that would be
    /// identical to the last synced state. Only meaningful within one process.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.cells.hash(&mut hasher);
        hasher.finish()
    }

    /// A resized copy; uncovered cells are transparent.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if the new size is outside `limits`.
    pub fn resize(
        &self,
        new_width: u32,
        new_height: u32,
        anchor: ResizeAnchor,
        limits: &GridLimits,
    ) -> EditorResult<Self> {
        let mut out = Self::new(new_width, new_height, limits)?;
        let (fx, fy) = anchor.factors();
        let ox = ResizeAnchor::offset(self.width, new_width, fx);
        let oy = ResizeAnchor::offset(self.height, new_height, fy);

        for y in 0..self.height {
            let ny = i64::from(y) + oy;
            if ny < 0 || ny >= i64::from(new_height) {
                continue;
            }
            for x in 0..self.width {
                let nx = i64::from(x) + ox;
                if nx < 0 || nx >= i64::from(new_width) {
                    continue;
                }
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let dst = ny as usize * new_width as usize + nx as usize;
                out.cells[dst] = self.cells[y as usize * self.width as usize + x as usize];
            }
        }
        out.dirty = true;
        Ok(out)
    }

    /// A copy containing only the cells inside `rect`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if `rect` is empty or
    /// extends past the grid.
    pub fn crop(&self, rect: GridRect, limits: &GridLimits) -> EditorResult<Self> {
        if rect.is_empty() || rect.right() > self.width || rect.bottom() > self.height {
            return Err(EditorError::InvalidDimensions {
                width: rect.width,
                height: rect.height,
                max_width: self.width.saturating_sub(rect.x),
                max_height: self.height.saturating_sub(rect.y),
            });
        }
        let mut out = Self::new(rect.width, rect.height, limits)?;
        let src_w = self.width as usize;
        for row in 0..rect.height as usize {
            let src = (rect.y as usize + row) * src_w + rect.x as usize;
            let dst = row * rect.width as usize;
            out.cells[dst..dst + rect.width as usize]
                .copy_from_slice(&self.cells[src..src + rect.width as usize]);
        }
        out.dirty = true;
        Ok(out)
    }

    /// A rotated copy.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidDimensions`] if a quarter turn would
    /// produce a size outside `limits`.
    pub fn rotate(&self, direction: RotateDirection, limits: &GridLimits) -> EditorResult<Self> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = match direction {
            RotateDirection::Half => Self::new(self.width, self.height, limits)?,
            _ => Self::new(self.height, self.width, limits)?,
        };
        for y in 0..h {
            for x in 0..w {
                let (nx, ny, nw) = match direction {
                    RotateDirection::Clockwise => (h - 1 - y, x, h),
                    RotateDirection::CounterClockwise => (y, w - 1 - x, h),
                    RotateDirection::Half => (w - 1 - x, h - 1 - y, w),
                };
                out.cells[ny * nw + nx] = self.cells[y * w + x];
            }
        }
        out.dirty = true;
        Ok(out)
    }

    /// A mirrored copy.
    #[must_use]
    pub fn flip(&self, axis: FlipAxis) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut cells = self.cells.clone();
        match axis {
            FlipAxis::Horizontal => cells.chunks_exact_mut(w).for_each(<[Color]>::reverse),
            FlipAxis::Vertical => {
                for y in 0..h / 2 {
                    let (top, bottom) = cells.split_at_mut((h - 1 - y) * w);
                    top[y * w..(y + 1) * w].swap_with_slice(&mut bottom[..w]);
                }
            }
        }
        Self {
            width: self.width,
            height: self.height,
            cells,
            dirty: true,
        }
    }
}

fn cell_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}
