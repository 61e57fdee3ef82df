//! Lock markers.
//!
//! A marker file exists in the crash directory for every file open for
//! editing. It is created with create-if-absent semantics, so two processes
//! racing for the same path cannot both own it. A marker left behind by a
//! process that is no longer running is evidence of a crash.
//!
//! Markers are not removed on drop: an unwinding panic must leave the marker
//! behind for the next session to find.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EditorError, EditorResult};

/// Contents of a lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process that created the marker.
    pub pid: u32,
    /// Editing session that created the marker.
    pub session_id: Uuid,
    /// File being edited; `None` for an untitled grid.
    pub target: Option<PathBuf>,
    /// Creation time, Unix milliseconds.
    pub created_at_ms: u64,
}

impl LockInfo {
    /// Describe the current process's session.
    #[must_use]
    pub fn current(session_id: Uuid, target: Option<PathBuf>) -> Self {
        Self {
            pid: std::process::id(),
            session_id,
            target,
            created_at_ms: current_timestamp_ms(),
        }
    }
}

/// What was found at a marker path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No marker.
    Absent,
    /// A marker whose owner is gone (or could not be probed, or whose
    /// contents are unreadable): a crashed session.
    Stale(Option<LockInfo>),
    /// A marker held by a running process.
    Live(LockInfo),
}

/// A marker owned by this session.
#[derive(Debug)]
pub struct LockMarker {
    path: PathBuf,
    info: LockInfo,
}

impl LockMarker {
    /// Create the marker at `path` if none exists.
    ///
    /// Returns `Ok(None)` if another marker is already there.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the marker cannot be created or written.
    pub fn try_acquire(path: &Path, info: LockInfo) -> EditorResult<Option<Self>> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(EditorError::io(path, e)),
        };
        let json = serde_json::to_vec_pretty(&info)?;
        if let Err(e) = file.write_all(&json).and_then(|()| file.sync_all()) {
            let _ = std::fs::remove_file(path);
            return Err(EditorError::io(path, e));
        }
        tracing::debug!("Acquired lock marker {}", path.display());
        Ok(Some(Self {
            path: path.to_path_buf(),
            info,
        }))
    }

    /// Replace a stale marker with ours.
    ///
    /// Returns `Ok(None)` if another process recreated the marker between
    /// the removal and our creation.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the stale marker cannot be removed or
    /// the new one cannot be written.
    pub fn take_over(path: &Path, info: LockInfo) -> EditorResult<Option<Self>> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(EditorError::io(path, e)),
        }
        tracing::warn!("Took over stale lock marker {}", path.display());
        Self::try_acquire(path, info)
    }

    /// The marker file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The marker contents.
    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Remove the marker.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the file exists but cannot be removed.
    pub fn release(self) -> EditorResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Lock marker {} vanished before release", self.path.display());
            }
            Err(e) => return Err(EditorError::io(&self.path, e)),
        }
        tracing::debug!("Released lock marker {}", self.path.display());
        Ok(())
    }
}

/// Inspect the marker at `path`.
///
/// # Errors
///
/// Returns [`EditorError::Io`] if the marker exists but cannot be read.
pub fn inspect(path: &Path) -> EditorResult<LockState> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LockState::Absent),
        Err(e) => return Err(EditorError::io(path, e)),
    };
    let Ok(info) = serde_json::from_slice::<LockInfo>(&contents) else {
        tracing::warn!("Unreadable lock marker {}; treating as stale", path.display());
        return Ok(LockState::Stale(None));
    };
    match process_alive(info.pid) {
        Some(true) => Ok(LockState::Live(info)),
        Some(false) | None => Ok(LockState::Stale(Some(info))),
    }
}

/// Probe whether `pid` is running. `None` when it cannot be determined.
#[cfg(unix)]
fn process_alive(pid: u32) -> Option<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).ok().filter(|&p| p > 0)?;
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Some(true),
        Err(Errno::ESRCH) => Some(false),
        Err(_) => None,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}

/// Get the current Unix timestamp in milliseconds.
fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
