//! Crash-directory layout.
//!
//! Every editing session has a key derived from the file it edits. The crash
//! directory holds `<key>.lock` (the lock marker) and `<key>.png` (the
//! crash-recovery copy), so a restart can go from marker to recovery copy to
//! original path without any other index.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

use super::lock::{self, LockInfo, LockState};
use crate::error::{EditorError, EditorResult};

const LOCK_EXTENSION: &str = "lock";
const RECOVERY_EXTENSION: &str = "png";

/// Deterministic crash-directory key for a session.
///
/// Bound files use `<sanitized file name>-<FNV-1a hash of the absolute
/// path>`; untitled grids use `untitled-<session id>`.
#[must_use]
pub fn recovery_key(target: Option<&Path>, session_id: Uuid) -> String {
    target.map_or_else(|| format!("untitled-{session_id}"), target_key)
}

/// Crash-directory key for a bound file. Independent of the session, so
/// any process can find the marker for a path.
#[must_use]
pub fn target_key(target: &Path) -> String {
    let absolute = absolute_path(target);
    let name = absolute
        .file_name()
        .map_or_else(|| "file".to_string(), |n| sanitize_filename(&n.to_string_lossy()));
    let hash = fnv1a(absolute.as_os_str().as_encoded_bytes());
    format!("{name}-{hash:016x}")
}

/// `path` made absolute against the working directory, without touching
/// the filesystem.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

/// Sanitize a file name for use in a key.
///
/// Replaces any character that is not alphanumeric, `-`, or `_` with `_`.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 64-bit FNV-1a; stable across processes and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// The marker and recovery-copy paths for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPaths {
    /// The session key.
    pub key: String,
    /// `<crash_dir>/<key>.lock`.
    pub lock: PathBuf,
    /// `<crash_dir>/<key>.png`.
    pub image: PathBuf,
}

impl RecoveryPaths {
    /// Paths for `key` inside `crash_dir`.
    #[must_use]
    pub fn new(crash_dir: &Path, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            lock: crash_dir.join(format!("{key}.{LOCK_EXTENSION}")),
            image: crash_dir.join(format!("{key}.{RECOVERY_EXTENSION}")),
            key,
        }
    }

    /// Paths for a session editing `target` (or untitled).
    #[must_use]
    pub fn for_session(crash_dir: &Path, target: Option<&Path>, session_id: Uuid) -> Self {
        Self::new(crash_dir, recovery_key(target, session_id))
    }

    /// Private paths for a session that found `key` held by a live
    /// session: `<key>-<session id>`. The holder's marker and recovery copy
    /// are never touched through them.
    #[must_use]
    pub fn for_guest(crash_dir: &Path, key: &str, session_id: Uuid) -> Self {
        Self::new(crash_dir, format!("{key}-{session_id}"))
    }

    /// Whether a recovery copy exists.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_file()
    }
}

/// A crashed session found in the crash directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryCandidate {
    /// Marker and recovery-copy paths.
    pub paths: RecoveryPaths,
    /// Marker contents, if the marker exists and is readable.
    pub info: Option<LockInfo>,
    /// Whether the recovery copy exists.
    pub has_image: bool,
    /// Recovery copy modification time.
    pub modified: Option<SystemTime>,
}

impl RecoveryCandidate {
    /// The file the crashed session was editing, if known.
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        self.info.as_ref().and_then(|i| i.target.as_deref())
    }
}

/// Remove a file, treating "already gone" as success.
///
/// # Errors
///
/// Returns [`EditorError::Io`] for any other failure.
pub fn remove_if_exists(path: &Path) -> EditorResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(EditorError::io(path, e)),
    }
}

/// List crashed sessions: stale markers, and recovery copies whose marker
/// is gone. Live sessions are skipped. A missing directory has none.
///
/// # Errors
///
/// Returns [`EditorError::Io`] if the directory cannot be read.
pub fn scan(crash_dir: &Path) -> EditorResult<Vec<RecoveryCandidate>> {
    let entries = match std::fs::read_dir(crash_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EditorError::io(crash_dir, e)),
    };

    let mut keys = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EditorError::io(crash_dir, e))?.path();
        let is_ours = path
            .extension()
            .is_some_and(|ext| ext == LOCK_EXTENSION || ext == RECOVERY_EXTENSION);
        if !is_ours {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !keys.iter().any(|k| k == stem) {
                keys.push(stem.to_string());
            }
        }
    }
    keys.sort();

    let mut candidates = Vec::new();
    for key in keys {
        let paths = RecoveryPaths::new(crash_dir, key);
        let info = match lock::inspect(&paths.lock)? {
            LockState::Live(_) => continue,
            LockState::Stale(info) => info,
            LockState::Absent => None,
        };
        let metadata = std::fs::metadata(&paths.image).ok();
        let has_image = metadata.as_ref().is_some_and(std::fs::Metadata::is_file);
        if info.is_none() && !has_image && !paths.lock.exists() {
            continue;
        }
        candidates.push(RecoveryCandidate {
            has_image,
            modified: metadata.and_then(|m| m.modified().ok()),
            paths,
            info,
        });
    }
    tracing::debug!(
        count = candidates.len(),
        "Scanned crash directory {}",
        crash_dir.display()
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic_and_path_specific() {
        let session = Uuid::new_v4();
        let a = recovery_key(Some(Path::new("/art/sprite.png")), session);
        let b = recovery_key(Some(Path::new("/art/sprite.png")), Uuid::new_v4());
        let c = recovery_key(Some(Path::new("/other/sprite.png")), session);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sprite_png-"));
        assert_eq!(a.len(), "sprite_png-".len() + 16);
    }

    #[test]
    fn test_untitled_key_uses_session() {
        let session = Uuid::new_v4();
        assert_eq!(recovery_key(None, session), format!("untitled-{session}"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my art (1).png"), "my_art__1__png");
        assert_eq!(sanitize_filename("ok-name_2"), "ok-name_2");
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_paths_layout() {
        let paths = RecoveryPaths::new(Path::new("/crash"), "k");
        assert_eq!(paths.lock, PathBuf::from("/crash/k.lock"));
        assert_eq!(paths.image, PathBuf::from("/crash/k.png"));
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let found = scan(&dir.path().join("missing")).expect("scan");
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_finds_stale_and_orphans_but_not_live() {
        let dir = tempfile::tempdir().expect("tempdir");
        let crash = dir.path();

        let stale = RecoveryPaths::new(crash, "stale");
        let dead = LockInfo {
            pid: 0x3fff_fff0,
            ..LockInfo::current(Uuid::new_v4(), Some(PathBuf::from("/art/a.png")))
        };
        std::fs::write(&stale.lock, serde_json::to_vec(&dead).expect("json")).expect("write");
        std::fs::write(&stale.image, b"png").expect("write");

        let orphan = RecoveryPaths::new(crash, "orphan");
        std::fs::write(&orphan.image, b"png").expect("write");

        let live = RecoveryPaths::new(crash, "live");
        let _marker = lock::LockMarker::try_acquire(&live.lock, LockInfo::current(Uuid::new_v4(), None))
            .expect("acquire")
            .expect("acquired");

        std::fs::write(crash.join("notes.txt"), b"ignored").expect("write");

        let found = scan(crash).expect("scan");
        let keys: Vec<_> = found.iter().map(|c| c.paths.key.as_str()).collect();
        assert_eq!(keys, vec!["orphan", "stale"]);
        assert_eq!(found[1].target(), Some(Path::new("/art/a.png")));
        assert!(found[1].has_image);
        assert!(found[0].info.is_none());
    }
}
