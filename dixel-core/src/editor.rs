//! The editor facade the UI layer drives.
//!
//! [`Editor`] owns one grid session: the grid, its viewport, brush, history
//! and persistence controller. Pointer input arrives in screen pixels and is
//! resolved to cells here; every tool runs inside one history action that
//! spans the whole drag. Structural operations go through snapshot history.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::brush::{BrushState, ToolKind};
use crate::codec::{ImageCodec, RasterCodec};
use crate::color::Color;
use crate::compositor::FrameView;
use crate::config::EditorConfig;
use crate::error::EditorResult;
use crate::event::EditorObserver;
use crate::geometry::{CellPos, GridRect, ScreenPoint};
use crate::grid::{FlipAxis, PixelGrid, ResizeAnchor, RotateDirection};
use crate::history::HistoryManager;
use crate::persistence::{AutosaveOutcome, LockInfo, PersistenceController, RecoveryOffer};
use crate::tools::{self, CellWriter, DeltaWriter, Mirrored};
use crate::viewport::{CursorStep, Direction, Viewport, ZoomAmount, ZoomDirection};

/// An open pointer drag.
#[derive(Debug, Clone, Copy)]
struct Drag {
    tool: ToolKind,
    anchor: CellPos,
    last: CellPos,
}

/// One editing session.
pub struct Editor<C = RasterCodec> {
    config: EditorConfig,
    grid: PixelGrid,
    viewport: Viewport,
    brush: BrushState,
    history: HistoryManager,
    persistence: PersistenceController<C>,
    observers: Vec<Box<dyn EditorObserver>>,
    drag: Option<Drag>,
    autosave_pending: bool,
    cursor: Option<CellPos>,
    show_center: bool,
    recovery: Option<RecoveryOffer>,
    conflict: Option<LockInfo>,
}

impl<C> std::fmt::Debug for Editor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("dirty", &self.grid.is_dirty())
            .field("tool", &self.brush.tool())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Editor<RasterCodec> {
    /// Start an untitled session with a blank grid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::InvalidDimensions`] for an illegal size
    /// and [`crate::EditorError::Io`] if the crash directory is unusable.
    pub fn new_untitled(config: EditorConfig, width: u32, height: u32, screen: (u32, u32)) -> EditorResult<Self> {
        let grid = PixelGrid::new(width, height, &config.grid)?;
        let persistence = PersistenceController::new_untitled(config.persistence.clone(), config.grid)?;
        Ok(Self::from_parts(config, grid, persistence, screen))
    }

    /// Open an image file. A crash-recovery copy or a conflicting live
    /// session is reported through [`Editor::recovery_offer`] and
    /// [`Editor::conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] or
    /// [`crate::EditorError::CorruptSource`] if the file cannot be loaded.
    pub fn open(config: EditorConfig, path: &Path, screen: (u32, u32)) -> EditorResult<Self> {
        let (persistence, opened) = PersistenceController::open(path, config.persistence.clone(), config.grid)?;
        let mut editor = Self::from_parts(config, opened.grid, persistence, screen);
        editor.recovery = opened.recovery;
        editor.conflict = opened.conflict;
        Ok(editor)
    }
}

impl<C: ImageCodec> Editor<C> {
    /// Assemble an editor from an existing grid and persistence session.
    #[must_use]
    pub fn from_parts(
        config: EditorConfig,
        grid: PixelGrid,
        persistence: PersistenceController<C>,
        screen: (u32, u32),
    ) -> Self {
        let viewport = Viewport::new(config.viewport, screen.0, screen.1, grid.width(), grid.height());
        Self {
            brush: BrushState::new(&config.brush),
            history: HistoryManager::new(config.history.max_depth),
            config,
            grid,
            viewport,
            persistence,
            observers: Vec::new(),
            drag: None,
            autosave_pending: false,
            cursor: None,
            show_center: false,
            recovery: None,
            conflict: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The grid.
    #[must_use]
    pub const fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// The viewport.
    #[must_use]
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Mutable viewport for pan/zoom input.
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// The brush.
    #[must_use]
    pub const fn brush(&self) -> &BrushState {
        &self.brush
    }

    /// Mutable brush for toolbar input.
    pub fn brush_mut(&mut self) -> &mut BrushState {
        &mut self.brush
    }

    /// The history.
    #[must_use]
    pub const fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// The persistence controller.
    #[must_use]
    pub const fn persistence(&self) -> &PersistenceController<C> {
        &self.persistence
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Whether a pointer drag is open.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Register an observer.
    pub fn add_observer(&mut self, observer: Box<dyn EditorObserver>) {
        self.observers.push(observer);
    }

    fn notify_grid(&mut self) {
        let dirty = self.grid.is_dirty();
        for observer in &mut self.observers {
            observer.on_grid_changed(dirty);
        }
    }

    fn notify_history(&mut self) {
        let (can_undo, can_redo) = (self.history.can_undo(), self.history.can_redo());
        for observer in &mut self.observers {
            observer.on_history_changed(can_undo, can_redo);
        }
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    fn clamp_to_grid(&self, cell: CellPos) -> CellPos {
        let max_x = i32::try_from(self.grid.width()).unwrap_or(i32::MAX) - 1;
        let max_y = i32::try_from(self.grid.height()).unwrap_or(i32::MAX) - 1;
        CellPos::new(cell.x.clamp(0, max_x), cell.y.clamp(0, max_y))
    }

    /// Run `paint` against the grid and record its deltas in the open
    /// action. Returns the number of cells changed.
    fn paint_with<F>(&mut self, mirror: bool, paint: F) -> usize
    where
        F: FnOnce(&mut dyn CellWriter, &BrushState),
    {
        let (horizontal, vertical) = if mirror {
            (self.brush.mirror_horizontal, self.brush.mirror_vertical)
        } else {
            (false, false)
        };
        let mut writer = Mirrored::new(DeltaWriter::new(&mut self.grid), horizontal, vertical);
        paint(&mut writer, &self.brush);
        let deltas = writer.into_inner().finish();
        let changed = deltas.len();
        self.history.record_deltas(deltas);
        changed
    }

    /// Draw the open drag from its anchor (line, rectangle) or along the
    /// latest segment (pencil, eraser).
    fn continue_drag(&mut self, drag: Drag, to: CellPos) -> bool {
        match drag.tool {
            ToolKind::Pencil | ToolKind::Eraser => {
                let from = drag.last;
                self.paint_with(true, |w, brush| tools::stroke_segment(w, brush, from, to)) > 0
            }
            ToolKind::Line => {
                self.history.rewind_action(&mut self.grid);
                self.paint_with(true, |w, brush| tools::draw_line(w, brush, drag.anchor, to));
                true
            }
            ToolKind::Rectangle => {
                self.history.rewind_action(&mut self.grid);
                self.paint_with(true, |w, brush| tools::draw_rectangle(w, brush, drag.anchor, to));
                true
            }
            ToolKind::Bucket | ToolKind::Eyedropper => false,
        }
    }

    /// Press at a screen point. Presses outside the grid are ignored.
    /// Returns the sampled color for the eyedropper, which also becomes the
    /// brush color.
    pub fn pointer_down(&mut self, point: ScreenPoint) -> Option<Color> {
        let cell = self.viewport.screen_to_cell(point);
        self.cursor = Some(cell);
        if !self.grid.contains(cell) {
            return None;
        }
        if self.drag.is_some() {
            tracing::warn!("pointer_down during an open drag; finishing it first");
            self.finish_drag();
        }

        let tool = self.brush.tool();
        match tool {
            ToolKind::Eyedropper => {
                let color = tools::eyedropper(&self.grid, cell).ok()?;
                self.brush.set_color(color);
                Some(color)
            }
            ToolKind::Bucket => {
                self.history.begin_action(tool.label());
                if self.paint_with(false, |w, brush| {
                    tools::bucket_fill(w, brush, cell);
                }) > 0
                {
                    self.notify_grid();
                }
                self.commit();
                None
            }
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Line | ToolKind::Rectangle => {
                self.history.begin_action(tool.label());
                let drag = Drag {
                    tool,
                    anchor: cell,
                    last: cell,
                };
                let changed = match tool {
                    ToolKind::Pencil | ToolKind::Eraser => {
                        self.paint_with(true, |w, brush| tools::stamp(w, brush, cell)) > 0
                    }
                    _ => self.continue_drag(drag, cell),
                };
                self.drag = Some(drag);
                if changed {
                    self.notify_grid();
                }
                None
            }
        }
    }

    /// Pointer motion. Updates the cursor overlay and extends an open drag,
    /// interpolating between successive positions so no cells are skipped.
    pub fn pointer_move(&mut self, point: ScreenPoint) {
        let cell = self.viewport.screen_to_cell(point);
        self.cursor = Some(cell);
        let Some(drag) = self.drag else {
            return;
        };
        let to = self.clamp_to_grid(cell);
        if to == drag.last {
            return;
        }
        let changed = self.continue_drag(drag, to);
        self.drag = Some(Drag { last: to, ..drag });
        if changed {
            self.notify_grid();
        }
    }

    /// Release: extends the drag to `point` and commits it as one history
    /// entry. Runs an autosave that was deferred during the drag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the deferred autosave fails; the
    /// stroke is committed regardless.
    pub fn pointer_up(&mut self, point: ScreenPoint) -> EditorResult<()> {
        if self.drag.is_none() {
            return Ok(());
        }
        self.pointer_move(point);
        self.finish_drag();
        self.run_deferred_autosave()
    }

    fn finish_drag(&mut self) {
        if self.drag.take().is_some() {
            self.commit();
        }
    }

    fn commit(&mut self) {
        self.history.commit_action();
        self.notify_history();
    }

    /// Abort the open drag, reverting everything it drew. Runs an
    /// autosave that was deferred during the drag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the deferred autosave fails.
    pub fn cancel_drag(&mut self) -> EditorResult<()> {
        if self.drag.take().is_none() {
            return Ok(());
        }
        let deltas = self.history.cancel_action();
        tools::revert(&mut self.grid, &deltas);
        if !deltas.is_empty() {
            self.notify_grid();
        }
        self.notify_history();
        self.run_deferred_autosave()
    }

    // -----------------------------------------------------------------------
    // Keyboard / wheel navigation
    // -----------------------------------------------------------------------

    /// Zoom from wheel input around `anchor`, honoring `invert_zoom`.
    pub fn zoom_wheel(&mut self, anchor: ScreenPoint, delta: f64) -> bool {
        ZoomDirection::from_wheel(delta, self.config.viewport.invert_zoom)
            .is_some_and(|dir| self.viewport.zoom_at(anchor, dir, ZoomAmount::Steps(1)))
    }

    /// Move the keyboard cursor, scrolling to keep it visible. Starts from
    /// the grid center when there is no cursor yet.
    pub fn move_cursor(&mut self, direction: Direction, step: CursorStep) -> CellPos {
        let start = self.cursor.filter(|&c| self.grid.contains(c)).unwrap_or_else(|| {
            let (w, h) = (self.grid.width() / 2, self.grid.height() / 2);
            CellPos::new(
                i32::try_from(w).unwrap_or(0),
                i32::try_from(h).unwrap_or(0),
            )
        });
        let cell = self.viewport.step_cursor(start, direction, step);
        self.cursor = Some(cell);
        cell
    }

    /// Resize the canvas area.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        self.viewport.set_screen_size(width, height);
    }

    /// Show or hide the grid center guides.
    pub fn set_show_center(&mut self, show: bool) {
        self.show_center = show;
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    fn sync_viewport(&mut self) {
        let (w, h) = (self.grid.width(), self.grid.height());
        if self.viewport.grid_size() != (w, h) {
            self.viewport.set_grid_size(w, h);
        }
    }

    /// Undo the latest entry. Ignored while a drag is open.
    pub fn undo(&mut self) -> Option<String> {
        let label = self.history.undo(&mut self.grid)?;
        self.sync_viewport();
        self.notify_grid();
        self.notify_history();
        Some(label)
    }

    /// Redo the latest undone entry. Ignored while a drag is open.
    pub fn redo(&mut self) -> Option<String> {
        let label = self.history.redo(&mut self.grid)?;
        self.sync_viewport();
        self.notify_grid();
        self.notify_history();
        Some(label)
    }

    // -----------------------------------------------------------------------
    // Structural operations
    // -----------------------------------------------------------------------

    fn replace_grid(&mut self, label: &str, next: PixelGrid) -> EditorResult<()> {
        self.finish_drag();
        let before = std::mem::replace(&mut self.grid, next);
        self.history.push_snapshot(label, before, self.grid.clone());
        self.sync_viewport();
        self.notify_grid();
        self.notify_history();
        self.run_deferred_autosave()
    }

    /// Resize the grid around `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::InvalidDimensions`] for an illegal size.
    pub fn resize(&mut self, width: u32, height: u32, anchor: ResizeAnchor) -> EditorResult<()> {
        let next = self.grid.resize(width, height, anchor, &self.config.grid)?;
        self.replace_grid("resize", next)
    }

    /// Crop the grid to `rect`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::InvalidDimensions`] if `rect` is empty
    /// or leaves the grid.
    pub fn crop(&mut self, rect: GridRect) -> EditorResult<()> {
        let next = self.grid.crop(rect, &self.config.grid)?;
        self.replace_grid("crop", next)
    }

    /// Rotate the grid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::InvalidDimensions`] if the rotated size
    /// exceeds the limits.
    pub fn rotate(&mut self, direction: RotateDirection) -> EditorResult<()> {
        let next = self.grid.rotate(direction, &self.config.grid)?;
        self.replace_grid("rotate", next)
    }

    /// Mirror the whole grid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if an autosave deferred by an open
    /// drag fails; the flip is applied regardless.
    pub fn flip(&mut self, axis: FlipAxis) -> EditorResult<()> {
        let next = self.grid.flip(axis);
        self.replace_grid("flip", next)
    }

    /// Set every cell to `color`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if an autosave deferred by an open
    /// drag fails; the grid is cleared regardless.
    pub fn clear(&mut self, color: Color) -> EditorResult<()> {
        let next = self.grid.fill_all(color);
        self.replace_grid("clear", next)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Autosave timer entry point.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the write fails.
    pub fn autosave_tick(&mut self) -> EditorResult<AutosaveOutcome> {
        self.autosave_tick_at(Instant::now())
    }

    /// Autosave timer entry point with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the write fails.
    pub fn autosave_tick_at(&mut self, now: Instant) -> EditorResult<AutosaveOutcome> {
        let outcome =
            self.persistence
                .autosave_tick(&mut self.grid, now, self.history.is_recording())?;
        match outcome {
            AutosaveOutcome::Deferred => self.autosave_pending = true,
            AutosaveOutcome::SavedToTarget(_) | AutosaveOutcome::Clean => self.notify_grid(),
            AutosaveOutcome::SavedToRecovery(_) | AutosaveOutcome::NotDue => {}
        }
        Ok(outcome)
    }

    fn run_deferred_autosave(&mut self) -> EditorResult<()> {
        if !std::mem::take(&mut self.autosave_pending) {
            return Ok(());
        }
        let outcome = self.persistence.autosave_now(&mut self.grid)?;
        tracing::debug!(?outcome, "Ran deferred autosave");
        if matches!(outcome, AutosaveOutcome::SavedToTarget(_) | AutosaveOutcome::Clean) {
            self.notify_grid();
        }
        Ok(())
    }

    /// Save to the bound file (or a fresh `new_file` name when untitled).
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the write fails; the grid and
    /// lock marker are unchanged.
    pub fn save(&mut self) -> EditorResult<PathBuf> {
        self.finish_drag();
        let path = self.persistence.save(&mut self.grid)?;
        self.notify_grid();
        Ok(path)
    }

    /// Save under a new name and bind the session to it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the write fails.
    pub fn save_as(&mut self, path: &Path) -> EditorResult<PathBuf> {
        self.finish_drag();
        let path = self.persistence.save_as(&mut self.grid, path)?;
        self.notify_grid();
        Ok(path)
    }

    /// Flush and end the session. Returns the path flushed to, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the flush fails; the session
    /// stays open and `close` may be retried.
    pub fn close(&mut self) -> EditorResult<Option<PathBuf>> {
        self.finish_drag();
        let flushed = self.persistence.close(&mut self.grid)?;
        self.notify_grid();
        Ok(flushed)
    }

    /// Write the crash-recovery copy without releasing the lock marker.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if the write fails.
    pub fn emergency_save(&mut self) -> EditorResult<PathBuf> {
        self.persistence.emergency_save(&self.grid)
    }

    /// The crash-recovery copy found when the file was opened.
    #[must_use]
    pub const fn recovery_offer(&self) -> Option<&RecoveryOffer> {
        self.recovery.as_ref()
    }

    /// The live session that held the file when it was opened.
    #[must_use]
    pub const fn conflict(&self) -> Option<&LockInfo> {
        self.conflict.as_ref()
    }

    /// Replace the grid with the offered recovery copy, as an undoable
    /// step. Returns `false` if there was no offer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] or
    /// [`crate::EditorError::CorruptSource`] if the copy cannot be loaded;
    /// the offer is kept.
    pub fn accept_recovery(&mut self) -> EditorResult<bool> {
        let Some(offer) = self.recovery.clone() else {
            return Ok(false);
        };
        let restored = self.persistence.restore_recovery(&offer)?;
        self.recovery = None;
        self.replace_grid("recover", restored);
        Ok(true)
    }

    /// Delete the offered recovery copy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Io`] if it cannot be removed.
    pub fn decline_recovery(&mut self) -> EditorResult<()> {
        if self.recovery.take().is_some() {
            self.persistence.discard_recovery()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// The data for the next frame.
    #[must_use]
    pub fn frame(&self) -> FrameView<'_> {
        let cursor = match self.cursor {
            Some(cell) if self.grid.contains(cell) => match self.brush.tool() {
                ToolKind::Bucket | ToolKind::Eyedropper => vec![cell],
                _ => tools::footprint_preview(&self.grid, &self.brush, cell),
            },
            _ => Vec::new(),
        };
        FrameView::new(&self.grid, &self.viewport, cursor, self.show_center)
    }
}
