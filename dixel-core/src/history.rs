//! Bounded undo/redo history.
//!
//! Per-cell tool actions are recorded as a [`HistoryEntry::CellDeltaSet`];
//! structural operations that change the grid's dimensions store the whole
//! grid before and after as a [`HistoryEntry::GridSnapshotPair`].
//!
//! Recording is a small state machine: `begin_action` opens a buffer,
//! `record_delta` appends to it and `commit_action`/`cancel_action` close it.

use std::collections::{HashMap, VecDeque};

use crate::geometry::CellPos;
use crate::grid::PixelGrid;
use crate::tools::{self, CellDelta};

/// One undoable unit of change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    /// The net cell changes of one tool action.
    CellDeltaSet {
        /// Short description ("pencil", "fill", ...).
        label: String,
        /// Changed cells in write order; never contains no-op deltas.
        deltas: Vec<CellDelta>,
    },
    /// A whole-grid replacement.
    GridSnapshotPair {
        /// Short description ("resize", "rotate", ...).
        label: String,
        /// Grid before the operation.
        before: PixelGrid,
        /// Grid after the operation.
        after: PixelGrid,
    },
}

impl HistoryEntry {
    /// The entry's description.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::CellDeltaSet { label, .. } | Self::GridSnapshotPair { label, .. } => label,
        }
    }

    fn apply_undo(&self, grid: &mut PixelGrid) {
        match self {
            Self::CellDeltaSet { deltas, .. } => tools::revert(grid, deltas),
            Self::GridSnapshotPair { before, .. } => {
                *grid = before.clone();
                grid.mark_dirty();
            }
        }
    }

    fn apply_redo(&self, grid: &mut PixelGrid) {
        match self {
            Self::CellDeltaSet { deltas, .. } => {
                for delta in deltas {
                    // Deltas only ever name in-grid cells.
                    let _ = grid.set(delta.pos, delta.new);
                }
            }
            Self::GridSnapshotPair { after, .. } => {
                *grid = after.clone();
                grid.mark_dirty();
            }
        }
    }
}

/// An action being recorded.
#[derive(Debug, Default)]
struct PendingAction {
    label: String,
    deltas: Vec<CellDelta>,
    index: HashMap<CellPos, usize>,
}

impl PendingAction {
    /// Merge repeated writes to one cell: keep the first old value and the
    /// last new value.
    fn record(&mut self, delta: CellDelta) {
        if let Some(&i) = self.index.get(&delta.pos) {
            self.deltas[i].new = delta.new;
        } else {
            self.index.insert(delta.pos, self.deltas.len());
            self.deltas.push(delta);
        }
    }
}

/// Undo and redo stacks with a bounded depth.
#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_depth: Option<usize>,
    pending: Option<PendingAction>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(Some(256))
    }
}

impl HistoryManager {
    /// Create an empty history keeping at most `max_depth` undo entries
    /// (`None` for unbounded).
    #[must_use]
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.map(|d| d.max(1)),
            pending: None,
        }
    }

    /// The configured depth limit.
    #[must_use]
    pub const fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Change the depth limit, dropping the oldest entries if needed.
    pub fn set_max_depth(&mut self, max_depth: Option<usize>) {
        self.max_depth = max_depth.map(|d| d.max(1));
        self.prune();
    }

    fn prune(&mut self) {
        if let Some(max) = self.max_depth {
            while self.undo_stack.len() > max {
                if let Some(dropped) = self.undo_stack.pop_front() {
                    tracing::debug!("Dropped oldest history entry '{}'", dropped.label());
                }
            }
        }
    }

    fn push(&mut self, entry: HistoryEntry) {
        tracing::debug!(
            undo = self.undo_stack.len() + 1,
            "Pushed history entry '{}'",
            entry.label()
        );
        self.redo_stack.clear();
        self.undo_stack.push_back(entry);
        self.prune();
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Whether an action is open.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.pending.is_some()
    }

    /// Open a new action. An action that is still open is committed first.
    pub fn begin_action(&mut self, label: impl Into<String>) {
        if self.pending.is_some() {
            tracing::warn!("begin_action while already recording; committing the open action");
            self.commit_action();
        }
        self.pending = Some(PendingAction {
            label: label.into(),
            ..PendingAction::default()
        });
    }

    /// Append a delta to the open action. Returns `false` (and drops the
    /// delta) when no action is open.
    pub fn record_delta(&mut self, delta: CellDelta) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.record(delta);
                true
            }
            None => {
                tracing::warn!("record_delta with no open action at ({}, {})", delta.pos.x, delta.pos.y);
                false
            }
        }
    }

    /// Append several deltas to the open action.
    pub fn record_deltas(&mut self, deltas: impl IntoIterator<Item = CellDelta>) {
        for delta in deltas {
            if !self.record_delta(delta) {
                return;
            }
        }
    }

    /// The open action's merged deltas.
    #[must_use]
    pub fn pending_deltas(&self) -> &[CellDelta] {
        self.pending.as_ref().map_or(&[][..], |p| p.deltas.as_slice())
    }

    /// Undo the open action's writes on `grid` and empty its buffer while
    /// keeping it open. Used by tools that redraw a preview on every move.
    pub fn rewind_action(&mut self, grid: &mut PixelGrid) {
        if let Some(pending) = self.pending.as_mut() {
            tools::revert(grid, &pending.deltas);
            pending.deltas.clear();
            pending.index.clear();
        }
    }

    /// Close the open action and push it. Net no-op deltas are dropped and
    /// an action left empty is cancelled. Returns `true` if an entry was
    /// pushed.
    pub fn commit_action(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let deltas: Vec<CellDelta> = pending.deltas.into_iter().filter(|d| !d.is_noop()).collect();
        if deltas.is_empty() {
            tracing::debug!("Action '{}' had no net effect; cancelled", pending.label);
            return false;
        }
        self.push(HistoryEntry::CellDeltaSet {
            label: pending.label,
            deltas,
        });
        true
    }

    /// Close the open action without pushing it and return its deltas so
    /// the caller can revert them.
    pub fn cancel_action(&mut self) -> Vec<CellDelta> {
        self.pending.take().map(|p| p.deltas).unwrap_or_default()
    }

    /// Push a whole-grid replacement.
    pub fn push_snapshot(&mut self, label: impl Into<String>, before: PixelGrid, after: PixelGrid) {
        if self.pending.is_some() {
            tracing::warn!("Snapshot pushed while recording; committing the open action");
            self.commit_action();
        }
        self.push(HistoryEntry::GridSnapshotPair {
            label: label.into(),
            before,
            after,
        });
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    /// Revert the most recent entry on `grid`. Returns its label, or `None`
    /// if there is nothing to undo or an action is being recorded.
    pub fn undo(&mut self, grid: &mut PixelGrid) -> Option<String> {
        if self.pending.is_some() {
            return None;
        }
        let entry = self.undo_stack.pop_back()?;
        entry.apply_undo(grid);
        let label = entry.label().to_string();
        self.redo_stack.push(entry);
        Some(label)
    }

    /// Re-apply the most recently undone entry on `grid`.
    pub fn redo(&mut self, grid: &mut PixelGrid) -> Option<String> {
        if self.pending.is_some() {
            return None;
        }
        let entry = self.redo_stack.pop()?;
        entry.apply_redo(grid);
        let label = entry.label().to_string();
        self.undo_stack.push_back(entry);
        self.prune();
        Some(label)
    }

    /// Whether [`HistoryManager::undo`] would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.pending.is_none() && !self.undo_stack.is_empty()
    }

    /// Whether [`HistoryManager::redo`] would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.pending.is_none() && !self.redo_stack.is_empty()
    }

    /// Number of undo entries.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redo entries.
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the entry `undo` would revert.
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(HistoryEntry::label)
    }

    /// Label of the entry `redo` would re-apply.
    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(HistoryEntry::label)
    }

    /// Forget everything, including an open action.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::config::GridLimits;
    use crate::grid::{ResizeAnchor, RotateDirection};
    use proptest::prelude::*;

    const C: Color = Color::rgb(1, 2, 3);
    const D: Color = Color::rgb(9, 9, 9);

    fn grid(w: u32, h: u32) -> PixelGrid {
        PixelGrid::new(w, h, &GridLimits::default()).expect("grid")
    }

    fn paint(history: &mut HistoryManager, grid: &mut PixelGrid, label: &str, cells: &[(i32, i32)], color: Color) {
        history.begin_action(label);
        for &(x, y) in cells {
            let pos = CellPos::new(x, y);
            let write = grid.set(pos, color).expect("set");
            history.record_delta(CellDelta {
                pos,
                old: write.old,
                new: color,
            });
        }
        history.commit_action();
    }

    #[test]
    fn test_pencil_then_undo() {
        let mut g = grid(4, 4);
        let mut history = HistoryManager::default();
        paint(&mut history, &mut g, "pencil", &[(1, 1)], C);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(g.get(CellPos::new(1, 1)).expect("get"), C);

        assert_eq!(history.undo(&mut g).as_deref(), Some("pencil"));
        assert!(g.get(CellPos::new(1, 1)).expect("get").is_transparent());
        assert!(history.can_redo());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_empty_stacks_are_silent() {
        let mut g = grid(2, 2);
        let before = g.clone();
        let mut history = HistoryManager::default();
        assert!(history.undo(&mut g).is_none());
        assert!(history.redo(&mut g).is_none());
        assert_eq!(g, before);
    }

    #[test]
    fn test_bounded_depth_keeps_most_recent() {
        let mut g = grid(8, 1);
        let mut history = HistoryManager::new(Some(3));
        for x in 0..5 {
            paint(&mut history, &mut g, &format!("p{x}"), &[(x, 0)], C);
        }
        assert_eq!(history.undo_len(), 3);
        let mut labels = Vec::new();
        while let Some(label) = history.undo(&mut g) {
            labels.push(label);
        }
        assert_eq!(labels, vec!["p4", "p3", "p2"]);
        // The two oldest strokes can no longer be undone.
        assert_eq!(g.get(CellPos::new(0, 0)).expect("get"), C);
        assert_eq!(g.get(CellPos::new(1, 0)).expect("get"), C);
        assert!(g.get(CellPos::new(2, 0)).expect("get").is_transparent());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut g = grid(4, 4);
        let mut history = HistoryManager::default();
        paint(&mut history, &mut g, "a", &[(0, 0)], C);
        history.undo(&mut g);
        assert_eq!(history.redo_len(), 1);
        paint(&mut history, &mut g, "b", &[(1, 0)], C);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_repeated_writes_merge() {
        let mut g = grid(4, 4);
        let mut history = HistoryManager::default();
        history.begin_action("pencil");
        for color in [C, D] {
            let pos = CellPos::new(2, 2);
            let write = g.set(pos, color).expect("set");
            history.record_delta(CellDelta {
                pos,
                old: write.old,
                new: color,
            });
        }
        assert_eq!(history.pending_deltas().len(), 1);
        assert!(history.commit_action());
        history.undo(&mut g);
        assert!(g.get(CellPos::new(2, 2)).expect("get").is_transparent());
        history.redo(&mut g);
        assert_eq!(g.get(CellPos::new(2, 2)).expect("get"), D);
    }

    #[test]
    fn test_net_noop_action_is_cancelled() {
        let mut g = grid(4, 4);
        let mut history = HistoryManager::default();
        history.begin_action("pencil");
        for color in [C, Color::TRANSPARENT] {
            let pos = CellPos::new(0, 0);
            let write = g.set(pos, color).expect("set");
            history.record_delta(CellDelta {
                pos,
                old: write.old,
                new: color,
            });
        }
        assert!(!history.commit_action());
        assert!(!history.is_recording());
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn test_cancel_returns_deltas() {
        let mut history = HistoryManager::default();
        history.begin_action("line");
        history.record_delta(CellDelta {
            pos: CellPos::new(0, 0),
            old: Color::TRANSPARENT,
            new: C,
        });
        assert!(!history.can_undo());
        assert_eq!(history.cancel_action().len(), 1);
        assert!(!history.is_recording());
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn test_record_without_action_is_rejected() {
        let mut history = HistoryManager::default();
        assert!(!history.record_delta(CellDelta {
            pos: CellPos::new(0, 0),
            old: Color::TRANSPARENT,
            new: C,
        }));
    }

    #[test]
    fn test_rewind_action_reverts_preview() {
        let mut g = grid(4, 4);
        let before = g.clone();
        let mut history = HistoryManager::default();
        history.begin_action("line");
        let write = g.set(CellPos::new(3, 3), C).expect("set");
        history.record_delta(CellDelta {
            pos: CellPos::new(3, 3),
            old: write.old,
            new: C,
        });
        history.rewind_action(&mut g);
        assert_eq!(g, before);
        assert!(history.is_recording());
        assert!(history.pending_deltas().is_empty());
    }

    #[test]
    fn test_snapshot_undo_swaps_dimensions() {
        let limits = GridLimits::default();
        let mut g = grid(4, 2);
        g.set(CellPos::new(3, 0), C).expect("set");
        let mut history = HistoryManager::default();

        let before = g.clone();
        let after = g.rotate(RotateDirection::Clockwise, &limits).expect("rotate");
        g = after.clone();
        history.push_snapshot("rotate", before.clone(), after.clone());

        history.undo(&mut g);
        assert_eq!(g, before);
        assert_eq!((g.width(), g.height()), (4, 2));
        assert!(g.is_dirty());

        history.redo(&mut g);
        assert_eq!(g, after);

        let resized = g.resize(8, 8, ResizeAnchor::Center, &limits).expect("resize");
        history.push_snapshot("resize", g.clone(), resized.clone());
        g = resized;
        assert_eq!(history.undo_label(), Some("resize"));
        history.undo(&mut g);
        assert_eq!(g, after);
    }

    #[test]
    fn test_set_max_depth_trims() {
        let mut g = grid(8, 1);
        let mut history = HistoryManager::new(None);
        for x in 0..6 {
            paint(&mut history, &mut g, "p", &[(x, 0)], C);
        }
        assert_eq!(history.undo_len(), 6);
        history.set_max_depth(Some(2));
        assert_eq!(history.undo_len(), 2);
        history.clear();
        assert!(!history.can_undo());
    }

    proptest! {
        #[test]
        fn prop_undo_redo_restores_exact_state(
            strokes in prop::collection::vec(
                prop::collection::vec((0i32..6, 0i32..6, 0u8..4), 1..8),
                1..10,
            ),
            undo_count in 1usize..10,
        ) {
            let palette = [Color::TRANSPARENT, C, D, Color::WHITE];
            let mut g = grid(6, 6);
            let mut history = HistoryManager::new(Some(4));
            for stroke in &strokes {
                history.begin_action("stroke");
                for &(x, y, c) in stroke {
                    let pos = CellPos::new(x, y);
                    let color = palette[usize::from(c)];
                    let write = g.set(pos, color).expect("set");
                    history.record_delta(CellDelta { pos, old: write.old, new: color });
                }
                history.commit_action();
            }
            prop_assert!(history.undo_len() <= 4);

            for _ in 0..undo_count {
                let before = g.clone();
                if history.undo(&mut g).is_none() {
                    break;
                }
                let undone = g.clone();
                history.redo(&mut g);
                prop_assert_eq!(&g, &before);
                history.undo(&mut g);
                prop_assert_eq!(&g, &undone);
            }
        }
    }
}
