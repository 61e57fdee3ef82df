//! Editor Session Integration Tests
//!
//! Drives the editor the way the UI layer does:
//! - Pointer strokes and history
//! - Bucket fill on enclosed regions
//! - Viewport zoom and pan during editing
//! - Save, reopen and close

use dixel_core::{
    CellPos, Color, Compositor, Direction, Editor, EditorConfig, EditorEvent, EventLog, FillMode,
    FrameView, ResizeAnchor, ScreenPoint, ToolKind,
};

const RED: Color = Color::rgb(255, 0, 0);

/// Config with every persistence path inside `root`.
fn config_in(root: &std::path::Path) -> EditorConfig {
    let mut config = EditorConfig::default();
    config.persistence.crash_dir = root.join("crash");
    config.persistence.untitled_dir = root.to_path_buf();
    config
}

/// Screen point at the center of `cell` for a viewport at zoom 10, no pan.
fn px(x: i32, y: i32) -> ScreenPoint {
    ScreenPoint::new(x * 10 + 5, y * 10 + 5)
}

fn click(editor: &mut Editor, x: i32, y: i32) {
    editor.pointer_down(px(x, y));
    editor.pointer_up(px(x, y)).expect("pointer up");
}

fn painted(editor: &Editor, color: Color) -> usize {
    editor.grid().cells().iter().filter(|c| **c == color).count()
}

// ============================================================================
// Drawing and history
// ============================================================================

#[test]
fn test_pencil_click_undo_restores_blank_grid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 16, 16, (160, 160)).expect("editor");
    editor.brush_mut().set_color(RED);

    click(&mut editor, 3, 4);
    assert_eq!(editor.grid().get(CellPos::new(3, 4)).expect("get"), RED);
    assert_eq!(painted(&editor, RED), 1);
    assert!(editor.history().can_undo());

    editor.undo();
    assert_eq!(painted(&editor, RED), 0);
    assert!(editor.history().can_redo());

    editor.redo();
    assert_eq!(painted(&editor, RED), 1);
}

#[test]
fn test_observers_see_grid_then_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    let log = EventLog::new();
    editor.add_observer(Box::new(log.clone()));

    click(&mut editor, 0, 0);
    assert_eq!(
        log.drain(),
        vec![
            EditorEvent::GridChanged { dirty: true },
            EditorEvent::HistoryChanged {
                can_undo: true,
                can_redo: false
            },
        ]
    );

    editor.undo();
    assert_eq!(
        log.last(),
        Some(EditorEvent::HistoryChanged {
            can_undo: false,
            can_redo: true
        })
    );
}

#[test]
fn test_bounded_history_drops_oldest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.history.max_depth = Some(3);
    let mut editor = Editor::new_untitled(config, 8, 8, (80, 80)).expect("editor");

    for x in 0..5 {
        click(&mut editor, x, 0);
    }
    assert_eq!(editor.history().undo_len(), 3);
    while editor.undo().is_some() {}
    // The two oldest strokes can no longer be undone.
    assert_eq!(painted(&editor, Color::BLACK), 2);
}

#[test]
fn test_new_stroke_clears_redo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    click(&mut editor, 1, 1);
    editor.undo();
    assert!(editor.history().can_redo());
    click(&mut editor, 2, 2);
    assert!(!editor.history().can_redo());
}

#[test]
fn test_mirrored_stroke() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    editor.brush_mut().mirror_horizontal = true;
    editor.brush_mut().mirror_vertical = true;
    click(&mut editor, 1, 2);
    for cell in [(1, 2), (6, 2), (1, 5), (6, 5)] {
        assert_eq!(
            editor.grid().get(CellPos::from(cell)).expect("get"),
            Color::BLACK,
            "{cell:?}"
        );
    }
    assert_eq!(painted(&editor, Color::BLACK), 4);
}

#[test]
fn test_eraser_restores_transparency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    editor.brush_mut().set_size(3);
    click(&mut editor, 4, 4);
    assert_eq!(painted(&editor, Color::BLACK), 9);

    editor.brush_mut().set_tool(ToolKind::Eraser);
    editor.brush_mut().set_size(1);
    click(&mut editor, 4, 4);
    assert_eq!(painted(&editor, Color::BLACK), 8);
    assert!(editor.grid().get(CellPos::new(4, 4)).expect("get").is_transparent());
}

// ============================================================================
// Bucket fill
// ============================================================================

#[test]
fn test_fill_inside_enclosure_stays_inside() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 12, 12, (120, 120)).expect("editor");

    // 5x5 outline from (2,2) to (6,6).
    editor.brush_mut().set_tool(ToolKind::Rectangle);
    editor.pointer_down(px(2, 2));
    editor.pointer_up(px(6, 6)).expect("up");
    assert_eq!(painted(&editor, Color::BLACK), 16);

    editor.brush_mut().set_tool(ToolKind::Bucket);
    editor.brush_mut().set_color(RED);
    editor.pointer_down(px(4, 4));
    assert_eq!(painted(&editor, RED), 9);
    assert!(editor.grid().get(CellPos::new(0, 0)).expect("get").is_transparent());

    editor.undo();
    assert_eq!(painted(&editor, RED), 0);
    assert_eq!(painted(&editor, Color::BLACK), 16);
}

#[test]
fn test_same_color_fill_reaches_disconnected_cells() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    click(&mut editor, 0, 0);
    click(&mut editor, 7, 7);

    editor.brush_mut().set_tool(ToolKind::Bucket);
    editor.brush_mut().fill_mode = FillMode::SameColor;
    editor.brush_mut().set_color(RED);
    editor.pointer_down(px(0, 0));
    assert_eq!(painted(&editor, RED), 2);
}

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn test_zoomed_view_maps_pointer_to_the_right_cell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 16, 16, (160, 160)).expect("editor");
    let anchor = px(8, 8);
    assert!(editor.zoom_wheel(anchor, 1.0));
    assert!(editor.zoom_wheel(anchor, 1.0));

    // The anchor still lands on the cell it was over.
    assert_eq!(editor.viewport().screen_to_cell(anchor), CellPos::new(8, 8));

    editor.pointer_down(anchor);
    editor.pointer_up(anchor).expect("up");
    assert_eq!(editor.grid().get(CellPos::new(8, 8)).expect("get"), Color::BLACK);
}

#[test]
fn test_pan_is_clamped_to_the_grid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 16, 16, (160, 160)).expect("editor");
    editor.viewport_mut().pan_by(-10_000.0, 0.0);
    let visible = editor.viewport().visible_cells();
    assert!(visible.width >= 1);
    assert!(visible.x < 16);
}

#[test]
fn test_frame_after_resize() {
    #[derive(Default)]
    struct Cells(usize);
    impl Compositor for Cells {
        fn render(&mut self, frame: &FrameView<'_>) {
            self.0 = frame.cells().count();
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    editor.resize(4, 4, ResizeAnchor::Center).expect("resize");
    editor.viewport_mut().reset();

    let mut compositor = Cells::default();
    compositor.render(&editor.frame());
    assert_eq!(compositor.0, 16);
}

#[test]
fn test_keyboard_cursor_paints_at_edge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 8, 8, (80, 80)).expect("editor");
    let cell = editor.move_cursor(Direction::Right, dixel_core::CursorStep::ToEdge);
    assert_eq!(cell, CellPos::new(7, 4));
    let point = editor.viewport().cell_center(cell);
    editor.pointer_down(point);
    editor.pointer_up(point).expect("up");
    assert_eq!(editor.grid().get(cell).expect("get"), Color::BLACK);
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_save_reopen_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());
    let path = dir.path().join("sprite.png");

    let mut editor = Editor::new_untitled(config.clone(), 8, 8, (80, 80)).expect("editor");
    editor.brush_mut().set_color(RED);
    click(&mut editor, 5, 1);
    let saved = editor.save_as(&path).expect("save as");
    assert!(!editor.grid().is_dirty());
    editor.close().expect("close");

    let reopened = Editor::open(config, &saved, (80, 80)).expect("open");
    assert_eq!(reopened.grid().get(CellPos::new(5, 1)).expect("get"), RED);
    assert!(reopened.recovery_offer().is_none());
    assert!(reopened.conflict().is_none());
    assert!(!reopened.history().can_undo());
}

#[test]
fn test_save_without_extension_writes_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut editor = Editor::new_untitled(config_in(dir.path()), 4, 4, (40, 40)).expect("editor");
    let saved = editor.save_as(&dir.path().join("noext")).expect("save as");
    assert!(saved.ends_with("noext.png"));
    assert!(saved.is_file());
}

#[test]
fn test_open_rejects_corrupt_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"definitely not a png").expect("write");
    let err = Editor::open(config_in(dir.path()), &path, (80, 80)).expect_err("corrupt");
    assert!(matches!(err, dixel_core::EditorError::CorruptSource { .. }));
}
