//! Image file boundary.
//!
//! The engine only ever sees decoded RGBA cells. [`ImageCodec`] is the seam
//! to the file format; [`RasterCodec`] implements it with the `image` crate
//! for PNG and BMP.

use std::path::{Path, PathBuf};

use image::{ExtendedColorType, ImageError, ImageFormat, ImageReader};

use crate::config::GridLimits;
use crate::error::{EditorError, EditorResult};
use crate::grid::PixelGrid;

/// Extensions the editor writes; anything else is saved as PNG.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "bmp"];

/// Reads and writes grids as image files.
pub trait ImageCodec {
    /// Decode `path` into a grid. Never returns a partially loaded grid.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the file cannot be read and
    /// [`EditorError::CorruptSource`] if it is not a valid image or exceeds
    /// `limits`.
    fn decode(&self, path: &Path, limits: &GridLimits) -> EditorResult<PixelGrid>;

    /// Encode `grid` to `path`, replacing any existing file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the file cannot be written.
    fn encode(&self, grid: &PixelGrid, path: &Path) -> EditorResult<()>;
}

/// PNG/BMP codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, path: &Path, limits: &GridLimits) -> EditorResult<PixelGrid> {
        let reader = ImageReader::open(path)
            .map_err(|e| EditorError::io(path, e))?
            .with_guessed_format()
            .map_err(|e| EditorError::io(path, e))?;
        let image = reader.decode().map_err(|e| image_error(path, e))?.to_rgba8();
        let (width, height) = image.dimensions();
        if limits.check(width, height).is_err() {
            return Err(EditorError::corrupt(
                path,
                format!(
                    "image is {width}x{height}, larger than the {}x{} maximum",
                    limits.max_width, limits.max_height
                ),
            ));
        }
        let grid = PixelGrid::from_rgba(width, height, image.as_raw(), limits)
            .map_err(|e| match e {
                EditorError::CorruptSource { reason, .. } => EditorError::corrupt(path, reason),
                other => other,
            })?;
        tracing::debug!("Decoded {width}x{height} image from {}", path.display());
        Ok(grid)
    }

    fn encode(&self, grid: &PixelGrid, path: &Path) -> EditorResult<()> {
        let format = format_for(path);
        let bytes = grid.to_rgba();
        write_atomic(path, |tmp| {
            image::save_buffer_with_format(
                tmp,
                &bytes,
                grid.width(),
                grid.height(),
                ExtendedColorType::Rgba8,
                format,
            )
            .map_err(|e| image_error(path, e))
        })?;
        tracing::debug!(
            "Encoded {}x{} grid to {}",
            grid.width(),
            grid.height(),
            path.display()
        );
        Ok(())
    }
}

fn image_error(path: &Path, err: ImageError) -> EditorError {
    match err {
        ImageError::IoError(source) => EditorError::io(path, source),
        other => EditorError::corrupt(path, other.to_string()),
    }
}

fn format_for(path: &Path) -> ImageFormat {
    match extension_of(path).as_deref() {
        Some("bmp") => ImageFormat::Bmp,
        _ => ImageFormat::Png,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Give `path` a supported image extension: `png` and `bmp` are kept,
/// anything else (including no extension) gets `.png` appended.
#[must_use]
pub fn normalize_image_path(path: &Path) -> PathBuf {
    match extension_of(path) {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".png");
            PathBuf::from(name)
        }
    }
}

/// The sibling temporary path used while writing `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "dixel".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Write through a sibling temporary file and rename it over `path`, so a
/// crash mid-write never leaves a truncated target.
///
/// # Errors
///
/// Returns the writer's error, or [`EditorError::Io`] if the rename fails.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> EditorResult<()>
where
    F: FnOnce(&Path) -> EditorResult<()>,
{
    let tmp = temp_sibling(path);
    if let Err(e) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        EditorError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::CellPos;

    fn sample_grid() -> PixelGrid {
        let limits = GridLimits::default();
        let mut grid = PixelGrid::new(3, 2, &limits).expect("grid");
        grid.set(CellPos::new(0, 0), Color::rgb(255, 0, 0)).expect("set");
        grid.set(CellPos::new(2, 1), Color::rgba(0, 0, 255, 128)).expect("set");
        grid
    }

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("art.png");
        let grid = sample_grid();
        RasterCodec.encode(&grid, &path).expect("encode");
        let loaded = RasterCodec
            .decode(&path, &GridLimits::default())
            .expect("decode");
        assert_eq!(loaded, grid);
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn test_bmp_keeps_opaque_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("art.bmp");
        let limits = GridLimits::default();
        let grid = PixelGrid::filled(4, 4, Color::rgb(10, 20, 30), &limits).expect("grid");
        RasterCodec.encode(&grid, &path).expect("encode");
        let loaded = RasterCodec.decode(&path, &limits).expect("decode");
        assert_eq!(loaded, grid);
    }

    #[test]
    fn test_encode_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("art.png");
        RasterCodec.encode(&sample_grid(), &path).expect("encode");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("art.png")]);
    }

    #[test]
    fn test_decode_missing_file_is_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = RasterCodec.decode(&dir.path().join("nope.png"), &GridLimits::default());
        assert!(matches!(result, Err(EditorError::Io { .. })));
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"definitely not a png").expect("write");
        let result = RasterCodec.decode(&path, &GridLimits::default());
        assert!(matches!(result, Err(EditorError::CorruptSource { .. })));
    }

    #[test]
    fn test_decode_oversized_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.png");
        let big = PixelGrid::new(
            8,
            8,
            &GridLimits {
                max_width: 8,
                max_height: 8,
                default_width: 8,
                default_height: 8,
            },
        )
        .expect("grid");
        RasterCodec.encode(&big, &path).expect("encode");
        let small = GridLimits {
            max_width: 4,
            max_height: 4,
            default_width: 4,
            default_height: 4,
        };
        let result = RasterCodec.decode(&path, &small);
        assert!(matches!(result, Err(EditorError::CorruptSource { .. })));
    }

    #[test]
    fn test_encode_into_missing_dir_is_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("art.png");
        let result = RasterCodec.encode(&sample_grid(), &path);
        assert!(matches!(result, Err(EditorError::Io { .. })));
    }

    #[test]
    fn test_normalize_image_path() {
        assert_eq!(normalize_image_path(Path::new("a.png")), PathBuf::from("a.png"));
        assert_eq!(normalize_image_path(Path::new("a.BMP")), PathBuf::from("a.BMP"));
        assert_eq!(normalize_image_path(Path::new("a.jpg")), PathBuf::from("a.jpg.png"));
        assert_eq!(normalize_image_path(Path::new("art")), PathBuf::from("art.png"));
    }
}
