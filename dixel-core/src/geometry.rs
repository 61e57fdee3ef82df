//! Coordinate types shared between the grid, viewport and tools.

use serde::{Deserialize, Serialize};

/// A cell coordinate in grid space.
///
/// Signed so that tool footprints and mirrored writes can be computed past
/// the grid edge and clipped afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellPos {
    /// Create a cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by `(dx, dy)` cells.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for CellPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// An axis-aligned rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl GridRect {
    /// Create a cell rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle spanned by two corner cells (inclusive), clipped to
    /// non-negative coordinates.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn spanning(a: CellPos, b: CellPos) -> Self {
        let x0 = a.x.min(b.x).max(0);
        let y0 = a.y.min(b.y).max(0);
        let x1 = a.x.max(b.x).max(0);
        let y1 = a.y.max(b.y).max(0);
        Self::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32 + 1,
            (y1 - y0) as u32 + 1,
        )
    }

    /// Whether the rectangle covers no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether the cell lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, pos: CellPos) -> bool {
        i64::from(pos.x) >= i64::from(self.x)
            && i64::from(pos.y) >= i64::from(self.y)
            && i64::from(pos.x) < i64::from(self.right())
            && i64::from(pos.y) < i64::from(self.bottom())
    }

    /// Iterate over every cell in row-major order.
    #[allow(clippy::cast_possible_wrap)]
    pub fn cells(self) -> impl Iterator<Item = CellPos> {
        (self.y..self.bottom())
            .flat_map(move |y| (self.x..self.right()).map(move |x| CellPos::new(x as i32, y as i32)))
    }
}

/// A point in screen pixels, relative to the canvas area's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// Horizontal pixel.
    pub x: i32,
    /// Vertical pixel.
    pub y: i32,
}

impl ScreenPoint {
    /// Create a screen point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A pixel-aligned screen rectangle with an exclusive right/bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl ScreenRect {
    /// Create a screen rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, p: ScreenPoint) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }
}

/// A rectangle in minimap-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinimapRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spanning_is_order_independent() {
        let a = CellPos::new(5, 1);
        let b = CellPos::new(2, 4);
        assert_eq!(GridRect::spanning(a, b), GridRect::spanning(b, a));
        assert_eq!(GridRect::spanning(a, b), GridRect::new(2, 1, 4, 4));
    }

    #[test]
    fn test_grid_rect_cells_row_major() {
        let cells: Vec<_> = GridRect::new(1, 1, 2, 2).cells().collect();
        assert_eq!(
            cells,
            vec![
                CellPos::new(1, 1),
                CellPos::new(2, 1),
                CellPos::new(1, 2),
                CellPos::new(2, 2)
            ]
        );
    }

    #[test]
    fn test_screen_rect_contains_is_half_open() {
        let rect = ScreenRect::new(10, 10, 4, 4);
        assert!(rect.contains(ScreenPoint::new(10, 13)));
        assert!(!rect.contains(ScreenPoint::new(14, 10)));
    }
}
