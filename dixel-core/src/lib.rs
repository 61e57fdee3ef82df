//! # Dixel Core
//!
//! The grid canvas engine of a pixel-art editor: a fixed-size grid of RGBA
//! cells, the viewport that maps it to the screen, the drawing tools,
//! bounded undo/redo, and autosave with crash recovery.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   Editor                    │
//! ├─────────────────────────────────────────────┤
//! │  Viewport        │  Tools + Brush           │
//! │  - Pan / zoom    │  - Pencil, eraser, fill  │
//! │  - Minimap       │  - Line, rectangle       │
//! │  - Cell mapping  │  - Mirroring             │
//! ├─────────────────────────────────────────────┤
//! │  History         │  Persistence             │
//! │  - Cell deltas   │  - Autosave              │
//! │  - Snapshots     │  - Lock markers          │
//! │  - Bounded depth │  - Crash recovery        │
//! ├─────────────────────────────────────────────┤
//! │                  PixelGrid                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Rendering is left to the UI layer: it implements [`Compositor`] and
//! reads everything it needs from [`FrameView`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod brush;
pub mod codec;
pub mod color;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod event;
pub mod geometry;
pub mod grid;
pub mod history;
pub mod persistence;
pub mod tools;
pub mod viewport;

pub use brush::{BrushState, FillMode, ToolKind};
pub use codec::{ImageCodec, RasterCodec};
pub use color::Color;
pub use compositor::{CellPaint, CenterGuides, Compositor, FrameView};
pub use config::{
    BrushConfig, EditorConfig, GridLimits, HistoryConfig, PersistenceConfig, ViewportConfig,
};
pub use editor::Editor;
pub use error::{EditorError, EditorResult};
pub use event::{EditorEvent, EditorObserver, EventLog};
pub use geometry::{CellPos, GridRect, MinimapRect, ScreenPoint, ScreenRect};
pub use grid::{FlipAxis, PixelGrid, ResizeAnchor, RotateDirection};
pub use history::{HistoryEntry, HistoryManager};
pub use persistence::{
    AutosaveOutcome, LockInfo, LockState, OpenedFile, PersistenceController, RecoveryCandidate,
    RecoveryOffer,
};
pub use tools::{CellDelta, CellWriter, DeltaWriter, Mirrored};
pub use viewport::{CursorStep, Direction, Viewport, ZoomAmount, ZoomDirection};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
