//! Change notifications for the UI layer.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Receives editor change notifications. Both methods default to no-ops.
pub trait EditorObserver {
    /// Grid content changed; `dirty` is the grid's unsaved-changes flag.
    fn on_grid_changed(&mut self, dirty: bool) {
        let _ = dirty;
    }

    /// The undo/redo availability may have changed.
    fn on_history_changed(&mut self, can_undo: bool, can_redo: bool) {
        let _ = (can_undo, can_redo);
    }
}

/// A recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EditorEvent {
    /// See [`EditorObserver::on_grid_changed`].
    GridChanged {
        /// Unsaved-changes flag.
        dirty: bool,
    },
    /// See [`EditorObserver::on_history_changed`].
    HistoryChanged {
        /// Undo available.
        can_undo: bool,
        /// Redo available.
        can_redo: bool,
    },
}

/// An observer that records events for later polling. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<EditorEvent>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return all recorded events.
    #[must_use]
    pub fn drain(&self) -> Vec<EditorEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// The most recent event.
    #[must_use]
    pub fn last(&self) -> Option<EditorEvent> {
        self.events.borrow().last().copied()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EditorObserver for EventLog {
    fn on_grid_changed(&mut self, dirty: bool) {
        self.events
            .borrow_mut()
            .push(EditorEvent::GridChanged { dirty });
    }

    fn on_history_changed(&mut self, can_undo: bool, can_redo: bool) {
        self.events
            .borrow_mut()
            .push(EditorEvent::HistoryChanged { can_undo, can_redo });
    }
}
