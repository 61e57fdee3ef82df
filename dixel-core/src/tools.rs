//! Tool algorithms.
//!
//! Tools never touch [`PixelGrid`] directly; they write through a
//! [`CellWriter`]. [`DeltaWriter`] applies writes and records the
//! `(cell, old, new)` deltas that become one history entry, and
//! [`Mirrored`] wraps any writer to repeat each write across the grid's
//! midlines. Positions outside the grid are clipped at the writer, so
//! footprints and lines may freely extend past the edge.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::brush::{BrushState, FillMode};
use crate::color::Color;
use crate::error::EditorResult;
use crate::geometry::CellPos;
use crate::grid::PixelGrid;

/// One recorded cell change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDelta {
    /// The cell.
    pub pos: CellPos,
    /// Value before the change.
    pub old: Color,
    /// Value after the change.
    pub new: Color,
}

impl CellDelta {
    /// Whether the change has no net effect.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

/// Destination for tool writes.
pub trait CellWriter {
    /// The grid being written, for reads and extents.
    fn grid(&self) -> &PixelGrid;

    /// Write one cell. Positions outside the grid are ignored.
    fn write(&mut self, pos: CellPos, color: Color);
}

/// Applies writes to a grid and records a delta for every changed cell.
#[derive(Debug)]
pub struct DeltaWriter<'a> {
    grid: &'a mut PixelGrid,
    deltas: Vec<CellDelta>,
}

impl<'a> DeltaWriter<'a> {
    /// Start recording writes to `grid`.
    pub fn new(grid: &'a mut PixelGrid) -> Self {
        Self {
            grid,
            deltas: Vec::new(),
        }
    }

    /// The deltas recorded so far, in write order.
    #[must_use]
    pub fn deltas(&self) -> &[CellDelta] {
        &self.deltas
    }

    /// Stop recording and return the deltas.
    #[must_use]
    pub fn finish(self) -> Vec<CellDelta> {
        self.deltas
    }
}

impl CellWriter for DeltaWriter<'_> {
    fn grid(&self) -> &PixelGrid {
        self.grid
    }

    fn write(&mut self, pos: CellPos, color: Color) {
        // Clipped: out-of-grid positions are not an error for tools.
        let Ok(write) = self.grid.set(pos, color) else {
            return;
        };
        if write.changed {
            self.deltas.push(CellDelta {
                pos,
                old: write.old,
                new: color,
            });
        }
    }
}

/// Repeats every write across the vertical and/or horizontal midline.
///
/// A mirrored position that coincides with one already written for the
/// same input is skipped, so a cell on the midline is written once.
#[derive(Debug)]
pub struct Mirrored<W> {
    inner: W,
    horizontal: bool,
    vertical: bool,
}

impl<W: CellWriter> Mirrored<W> {
    /// Wrap `inner` with the given mirror flags.
    pub const fn new(inner: W, horizontal: bool, vertical: bool) -> Self {
        Self {
            inner,
            horizontal,
            vertical,
        }
    }

    /// Wrap `inner` using the brush's mirror flags.
    pub const fn for_brush(inner: W, brush: &BrushState) -> Self {
        Self::new(inner, brush.mirror_horizontal, brush.mirror_vertical)
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// `pos` and its mirror images, deduplicated.
    fn images(&self, pos: CellPos) -> Vec<CellPos> {
        mirror_images(self.inner.grid(), pos, self.horizontal, self.vertical)
    }
}

impl<W: CellWriter> CellWriter for Mirrored<W> {
    fn grid(&self) -> &PixelGrid {
        self.inner.grid()
    }

    fn write(&mut self, pos: CellPos, color: Color) {
        for image in self.images(pos) {
            self.inner.write(image, color);
        }
    }
}

fn mirror_images(grid: &PixelGrid, pos: CellPos, horizontal: bool, vertical: bool) -> Vec<CellPos> {
    let width = i32::try_from(grid.width()).unwrap_or(i32::MAX);
    let height = i32::try_from(grid.height()).unwrap_or(i32::MAX);
    let mx = width - 1 - pos.x;
    let my = height - 1 - pos.y;

    let mut images = vec![pos];
    let mut push = |p: CellPos| {
        if !images.contains(&p) {
            images.push(p);
        }
    };
    if horizontal {
        push(CellPos::new(mx, pos.y));
    }
    if vertical {
        push(CellPos::new(pos.x, my));
    }
    if horizontal && vertical {
        push(CellPos::new(mx, my));
    }
    images
}

// ---------------------------------------------------------------------------
// Pencil / eraser
// ---------------------------------------------------------------------------

/// Write the brush footprint around `target` with the brush's stroke color.
pub fn stamp<W: CellWriter + ?Sized>(writer: &mut W, brush: &BrushState, target: CellPos) {
    let color = brush.stroke_color();
    for cell in brush.footprint(target) {
        writer.write(cell, color);
    }
}

/// Stamp along the line from `from` to `to`, so fast pointer movement
/// leaves no gaps. Used for drag continuation and for the line tool.
pub fn stroke_segment<W: CellWriter + ?Sized>(
    writer: &mut W,
    brush: &BrushState,
    from: CellPos,
    to: CellPos,
) {
    for cell in line_cells(from, to) {
        stamp(writer, brush, cell);
    }
}

// ---------------------------------------------------------------------------
// Bucket fill
// ---------------------------------------------------------------------------

/// Cells a bucket fill at `start` would replace.
///
/// Empty when `start` is outside the grid or already holds `color`. The
/// contiguous mode walks 4-neighbours with an explicit stack and a visited
/// mask, so memory is bounded by the grid size.
#[must_use]
pub fn fill_region(grid: &PixelGrid, start: CellPos, color: Color, mode: FillMode) -> Vec<CellPos> {
    let Ok(target) = grid.get(start) else {
        return Vec::new();
    };
    if target == color {
        return Vec::new();
    }

    match mode {
        FillMode::SameColor => grid
            .bounds()
            .cells()
            .filter(|&p| grid.get(p).is_ok_and(|c| c == target))
            .collect(),
        FillMode::Contiguous => flood_contiguous(grid, start, target),
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn flood_contiguous(grid: &PixelGrid, start: CellPos, target: Color) -> Vec<CellPos> {
    let w = grid.width() as usize;
    let h = grid.height() as usize;
    let cells = grid.cells();
    let mut visited = vec![false; w * h];
    let mut region = Vec::new();

    let seed = start.y as usize * w + start.x as usize;
    let mut stack = Vec::with_capacity(1024);
    visited[seed] = true;
    stack.push(seed);

    while let Some(idx) = stack.pop() {
        let x = idx % w;
        let y = idx / w;
        region.push(CellPos::new(x as i32, y as i32));

        let mut visit = |n: usize| {
            if !visited[n] && cells[n] == target {
                visited[n] = true;
                stack.push(n);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - w);
        }
        if y + 1 < h {
            visit(idx + w);
        }
    }
    region
}

/// Bucket fill at `start` with the brush color and fill mode. Returns the
/// number of cells replaced; zero when the region already has the color.
pub fn bucket_fill<W: CellWriter + ?Sized>(writer: &mut W, brush: &BrushState, start: CellPos) -> usize {
    let color = brush.color();
    let region = fill_region(writer.grid(), start, color, brush.fill_mode);
    for &cell in &region {
        writer.write(cell, color);
    }
    tracing::debug!(cells = region.len(), mode = ?brush.fill_mode, "Bucket fill");
    region.len()
}

// ---------------------------------------------------------------------------
// Eyedropper
// ---------------------------------------------------------------------------

/// Sample a cell color. Pure read.
///
/// # Errors
///
/// Returns [`crate::EditorError::OutOfBounds`] if `pos` is outside the grid.
pub fn eyedropper(grid: &PixelGrid, pos: CellPos) -> EditorResult<Color> {
    grid.get(pos)
}

// ---------------------------------------------------------------------------
// Line / rectangle
// ---------------------------------------------------------------------------

/// Cells on the straight line from `a` to `b`, inclusive, in order.
///
/// Rasterization always runs from the lexicographically smaller endpoint,
/// so `line_cells(a, b)` and `line_cells(b, a)` touch the same cells (the
/// latter in reverse).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn line_cells(a: CellPos, b: CellPos) -> Vec<CellPos> {
    let swapped = b < a;
    let (from, to) = if swapped { (b, a) } else { (a, b) };

    let (mut x, mut y) = (i64::from(from.x), i64::from(from.y));
    let (x1, y1) = (i64::from(to.x), i64::from(to.y));
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut cells = Vec::new();
    loop {
        cells.push(CellPos::new(x as i32, y as i32));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    if swapped {
        cells.reverse();
    }
    cells
}

/// Cells of the axis-aligned rectangle with corners `a` and `b`, either
/// the border only or the whole interior.
#[must_use]
pub fn rectangle_cells(a: CellPos, b: CellPos, filled: bool) -> Vec<CellPos> {
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));

    if filled {
        return (y0..=y1)
            .flat_map(|y| (x0..=x1).map(move |x| CellPos::new(x, y)))
            .collect();
    }

    let mut cells: Vec<CellPos> = (x0..=x1).map(|x| CellPos::new(x, y0)).collect();
    if y1 > y0 {
        cells.extend((x0..=x1).map(|x| CellPos::new(x, y1)));
    }
    for y in (y0 + 1)..y1 {
        cells.push(CellPos::new(x0, y));
        if x1 > x0 {
            cells.push(CellPos::new(x1, y));
        }
    }
    cells
}

/// Draw a line with the brush footprint.
pub fn draw_line<W: CellWriter + ?Sized>(writer: &mut W, brush: &BrushState, a: CellPos, b: CellPos) {
    stroke_segment(writer, brush, a, b);
}

/// Draw a rectangle with single-cell edges in the stroke color.
pub fn draw_rectangle<W: CellWriter + ?Sized>(writer: &mut W, brush: &BrushState, a: CellPos, b: CellPos) {
    let color = brush.stroke_color();
    for cell in rectangle_cells(a, b, brush.rectangle_filled) {
        writer.write(cell, color);
    }
}

// ---------------------------------------------------------------------------
// Cursor preview
// ---------------------------------------------------------------------------

/// In-grid cells the brush would touch at `target`, including mirror
/// images, for the cursor overlay.
#[must_use]
pub fn footprint_preview(grid: &PixelGrid, brush: &BrushState, target: CellPos) -> Vec<CellPos> {
    let mut cells = BTreeSet::new();
    for cell in brush.footprint(target) {
        for image in mirror_images(grid, cell, brush.mirror_horizontal, brush.mirror_vertical) {
            if grid.contains(image) {
                cells.insert(image);
            }
        }
    }
    cells.into_iter().collect()
}

/// Undo `deltas` on `grid`, newest first.
pub fn revert(grid: &mut PixelGrid, deltas: &[CellDelta]) {
    for delta in deltas.iter().rev() {
        // Deltas only ever name in-grid cells.
        let _ = grid.set(delta.pos, delta.old);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::ToolKind;
    use crate::config::GridLimits;
    use proptest::prelude::*;

    const A: Color = Color::rgb(10, 10, 10);
    const B: Color = Color::rgb(200, 0, 0);
    const C: Color = Color::rgb(0, 0, 200);

    fn grid(w: u32, h: u32, color: Color) -> PixelGrid {
        PixelGrid::filled(w, h, color, &GridLimits::default()).expect("grid")
    }

    fn brush(color: Color) -> BrushState {
        let mut brush = BrushState::default();
        brush.set_color(color);
        brush
    }

    #[test]
    fn test_pencil_single_cell() {
        let mut g = grid(4, 4, Color::TRANSPARENT);
        let mut writer = DeltaWriter::new(&mut g);
        stamp(&mut writer, &brush(C), CellPos::new(1, 1));
        let deltas = writer.finish();
        assert_eq!(
            deltas,
            vec![CellDelta {
                pos: CellPos::new(1, 1),
                old: Color::TRANSPARENT,
                new: C
            }]
        );
        assert_eq!(g.get(CellPos::new(1, 1)).expect("get"), C);
    }

    #[test]
    fn test_stamp_clips_at_edges() {
        let mut g = grid(4, 4, Color::TRANSPARENT);
        let mut b = brush(C);
        b.set_size(3);
        let mut writer = DeltaWriter::new(&mut g);
        stamp(&mut writer, &b, CellPos::new(0, 0));
        assert_eq!(writer.finish().len(), 4);
    }

    #[test]
    fn test_eraser_writes_transparent() {
        let mut g = grid(3, 3, A);
        let mut b = brush(C);
        b.set_tool(ToolKind::Eraser);
        let mut writer = DeltaWriter::new(&mut g);
        stamp(&mut writer, &b, CellPos::new(2, 2));
        assert_eq!(writer.finish().len(), 1);
        assert!(g.get(CellPos::new(2, 2)).expect("get").is_transparent());
    }

    #[test]
    fn test_unchanged_writes_record_nothing() {
        let mut g = grid(3, 3, C);
        let mut writer = DeltaWriter::new(&mut g);
        stamp(&mut writer, &brush(C), CellPos::new(1, 1));
        assert!(writer.finish().is_empty());
        assert!(!g.is_dirty());
    }

    #[test]
    fn test_mirror_both_axes() {
        let mut g = grid(8, 6, Color::TRANSPARENT);
        let mut b = brush(C);
        b.mirror_horizontal = true;
        b.mirror_vertical = true;
        let mut writer = Mirrored::for_brush(DeltaWriter::new(&mut g), &b);
        stamp(&mut writer, &b, CellPos::new(1, 1));
        let deltas = writer.into_inner().finish();
        let cells: BTreeSet<_> = deltas.iter().map(|d| d.pos).collect();
        let expected: BTreeSet<_> = [(1, 1), (6, 1), (1, 4), (6, 4)]
            .into_iter()
            .map(CellPos::from)
            .collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_mirror_on_midline_writes_once() {
        let mut g = grid(5, 5, Color::TRANSPARENT);
        let mut b = brush(C);
        b.mirror_horizontal = true;
        let mut writer = Mirrored::for_brush(DeltaWriter::new(&mut g), &b);
        stamp(&mut writer, &b, CellPos::new(2, 0));
        assert_eq!(writer.into_inner().finish().len(), 1);
    }

    #[test]
    fn test_mirrored_even_brush_matches_reflected_footprint() {
        let mut g = grid(10, 10, Color::TRANSPARENT);
        let mut b = brush(C);
        b.set_size(2);
        b.mirror_horizontal = true;
        {
            let mut writer = Mirrored::for_brush(DeltaWriter::new(&mut g), &b);
            stamp(&mut writer, &b, CellPos::new(3, 3));
        }
        // Footprint covers x 2..=3; its mirror covers x 6..=7.
        for x in [2, 3, 6, 7] {
            assert_eq!(g.get(CellPos::new(x, 3)).expect("get"), C, "x = {x}");
        }
        assert!(g.get(CellPos::new(5, 3)).expect("get").is_transparent());
    }

    #[test]
    fn test_fill_enclosed_10x10_region() {
        // 12x12 grid: a one-cell border of A around a 10x10 interior of B.
        let mut g = grid(12, 12, A);
        for y in 1..11 {
            for x in 1..11 {
                g.set(CellPos::new(x, y), B).expect("set");
            }
        }
        let before = g.clone();
        let mut writer = DeltaWriter::new(&mut g);
        let filled = bucket_fill(&mut writer, &brush(C), CellPos::new(5, 5));
        let deltas = writer.finish();
        assert_eq!(filled, 100);
        assert_eq!(deltas.len(), 100);
        for x in 0..12 {
            for y in [0, 11] {
                assert_eq!(g.get(CellPos::new(x, y)).expect("get"), A);
                assert_eq!(g.get(CellPos::new(y, x)).expect("get"), A);
            }
        }
        assert_ne!(g, before);
    }

    #[test]
    fn test_fill_only_block_cells() {
        let mut g = grid(8, 8, A);
        for y in 2..=4 {
            for x in 2..=4 {
                g.set(CellPos::new(x, y), B).expect("set");
            }
        }
        let mut writer = DeltaWriter::new(&mut g);
        bucket_fill(&mut writer, &brush(C), CellPos::new(3, 3));
        let deltas = writer.finish();
        assert_eq!(deltas.len(), 9);
        assert!(deltas.iter().all(|d| d.old == B && d.new == C));
        let c_count = g.cells().iter().filter(|&&c| c == C).count();
        assert_eq!(c_count, 9);
        assert_eq!(g.get(CellPos::new(1, 1)).expect("get"), A);
    }

    #[test]
    fn test_fill_same_color_is_noop() {
        let mut g = grid(6, 6, C);
        let mut writer = DeltaWriter::new(&mut g);
        assert_eq!(bucket_fill(&mut writer, &brush(C), CellPos::new(0, 0)), 0);
        assert!(writer.finish().is_empty());
    }

    #[test]
    fn test_fill_outside_grid_is_noop() {
        let g = grid(6, 6, A);
        assert!(fill_region(&g, CellPos::new(-1, 2), C, FillMode::Contiguous).is_empty());
        assert!(fill_region(&g, CellPos::new(6, 0), C, FillMode::Contiguous).is_empty());
    }

    #[test]
    fn test_fill_is_4_connected() {
        // Diagonal neighbours are not connected.
        let mut g = grid(3, 3, A);
        g.set(CellPos::new(0, 0), B).expect("set");
        g.set(CellPos::new(1, 1), B).expect("set");
        let region = fill_region(&g, CellPos::new(0, 0), C, FillMode::Contiguous);
        assert_eq!(region, vec![CellPos::new(0, 0)]);
    }

    #[test]
    fn test_fill_same_color_mode_is_global() {
        let mut g = grid(5, 5, A);
        g.set(CellPos::new(0, 0), B).expect("set");
        g.set(CellPos::new(4, 4), B).expect("set");
        let region = fill_region(&g, CellPos::new(0, 0), C, FillMode::SameColor);
        assert_eq!(region.len(), 2);
    }

    #[test]
    fn test_fill_largest_grid_terminates() {
        let g = grid(256, 256, Color::TRANSPARENT);
        let region = fill_region(&g, CellPos::new(128, 128), C, FillMode::Contiguous);
        assert_eq!(region.len(), 256 * 256);
    }

    #[test]
    fn test_eyedropper_reads_without_dirtying() {
        let mut g = grid(3, 3, A);
        g.set(CellPos::new(2, 1), B).expect("set");
        g.mark_clean();
        assert_eq!(eyedropper(&g, CellPos::new(2, 1)).expect("sample"), B);
        assert!(!g.is_dirty());
        assert!(eyedropper(&g, CellPos::new(3, 1)).is_err());
    }

    #[test]
    fn test_line_cells_horizontal_and_diagonal() {
        assert_eq!(
            line_cells(CellPos::new(0, 0), CellPos::new(3, 0)),
            (0..=3).map(|x| CellPos::new(x, 0)).collect::<Vec<_>>()
        );
        assert_eq!(
            line_cells(CellPos::new(0, 0), CellPos::new(2, 2)),
            vec![CellPos::new(0, 0), CellPos::new(1, 1), CellPos::new(2, 2)]
        );
        assert_eq!(line_cells(CellPos::new(4, 4), CellPos::new(4, 4)).len(), 1);
    }

    #[test]
    fn test_rectangle_outline_and_filled() {
        let outline = rectangle_cells(CellPos::new(3, 3), CellPos::new(0, 0), false);
        assert_eq!(outline.len(), 12);
        let unique: BTreeSet<_> = outline.iter().collect();
        assert_eq!(unique.len(), 12);
        assert!(!outline.contains(&CellPos::new(1, 1)));

        let filled = rectangle_cells(CellPos::new(0, 0), CellPos::new(3, 3), true);
        assert_eq!(filled.len(), 16);

        assert_eq!(rectangle_cells(CellPos::new(2, 2), CellPos::new(2, 2), false).len(), 1);
        assert_eq!(rectangle_cells(CellPos::new(0, 2), CellPos::new(4, 2), false).len(), 5);
    }

    #[test]
    fn test_stroke_segment_has_no_gaps() {
        let mut g = grid(16, 16, Color::TRANSPARENT);
        let mut writer = DeltaWriter::new(&mut g);
        stroke_segment(&mut writer, &brush(C), CellPos::new(0, 0), CellPos::new(15, 3));
        assert_eq!(writer.finish().len(), 16);
    }

    #[test]
    fn test_revert_restores_grid() {
        let mut g = grid(5, 5, A);
        let before = g.clone();
        let mut writer = DeltaWriter::new(&mut g);
        draw_rectangle(&mut writer, &brush(C), CellPos::new(0, 0), CellPos::new(4, 4));
        let deltas = writer.finish();
        revert(&mut g, &deltas);
        assert_eq!(g, before);
    }

    #[test]
    fn test_footprint_preview_includes_mirrors() {
        let g = grid(6, 6, A);
        let mut b = brush(C);
        b.mirror_vertical = true;
        let cells = footprint_preview(&g, &b, CellPos::new(0, 0));
        assert_eq!(cells, vec![CellPos::new(0, 0), CellPos::new(0, 5)]);
    }

    proptest! {
        #[test]
        fn prop_line_is_symmetric(
            ax in -300i32..300, ay in -300i32..300,
            bx in -300i32..300, by in -300i32..300,
        ) {
            let a = CellPos::new(ax, ay);
            let b = CellPos::new(bx, by);
            let forward: BTreeSet<_> = line_cells(a, b).into_iter().collect();
            let backward: BTreeSet<_> = line_cells(b, a).into_iter().collect();
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_line_is_connected(
            ax in -50i32..50, ay in -50i32..50,
            bx in -50i32..50, by in -50i32..50,
        ) {
            let cells = line_cells(CellPos::new(ax, ay), CellPos::new(bx, by));
            prop_assert_eq!(cells[0], CellPos::new(ax, ay));
            prop_assert_eq!(*cells.last().expect("non-empty"), CellPos::new(bx, by));
            for pair in cells.windows(2) {
                prop_assert!((pair[0].x - pair[1].x).abs() <= 1);
                prop_assert!((pair[0].y - pair[1].y).abs() <= 1);
            }
        }
    }
}
