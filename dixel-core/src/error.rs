//! Error types for grid editing and persistence.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors that can occur in editor operations.
///
/// `OutOfBounds` and `InvalidDimensions` are contract violations from the
/// calling layer; `Io`, `CorruptSource` and `Config` are expected at runtime
/// and never cause the in-memory grid or history to be discarded.
#[derive(Debug, Error)]
pub enum EditorError {
    /// A cell coordinate lies outside the grid extent.
    #[error("Cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// Requested grid dimensions are zero or above the configured maximum.
    #[error("Invalid grid dimensions {width}x{height} (maximum {max_width}x{max_height})")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Configured maximum width.
        max_width: u32,
        /// Configured maximum height.
        max_height: u32,
    },

    /// A save, load or lock-marker operation failed.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        /// The path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Decoded image data is malformed or unsupported.
    #[error("Corrupt image source {}: {reason}", path.display())]
    CorruptSource {
        /// The path the data came from.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EditorError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a corrupt-source error for `path`.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error should be shown to the user with a retry option.
    ///
    /// Contract violations return `false`: they indicate a bug in the
    /// calling layer's input clamping.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::CorruptSource { .. } | Self::Config(_)
        )
    }

    /// The path involved in the failure, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::CorruptSource { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        let io = EditorError::io(
            "/tmp/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(io.is_user_facing());
        assert_eq!(io.path(), Some(Path::new("/tmp/a.png")));

        let oob = EditorError::OutOfBounds {
            x: 9,
            y: 0,
            width: 4,
            height: 4,
        };
        assert!(!oob.is_user_facing());
        assert!(oob.path().is_none());
    }

    #[test]
    fn test_display_mentions_path() {
        let err = EditorError::corrupt("broken.png", "truncated");
        let text = err.to_string();
        assert!(text.contains("broken.png"));
        assert!(text.contains("truncated"));
    }
}
