//! Command results and their text/JSON rendering.

use std::fmt;
use std::path::PathBuf;

use dixel_core::{LockInfo, LockState, RecoveryCandidate};
use serde::Serialize;

/// State of an image's lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum LockSummary {
    /// No marker.
    Absent,
    /// Marker left by a process that is gone.
    Stale {
        /// Former owner, if the marker was readable.
        pid: Option<u32>,
    },
    /// Marker held by a running session.
    Live {
        /// Owning process.
        pid: u32,
        /// Owning session.
        session_id: String,
    },
}

impl From<&LockState> for LockSummary {
    fn from(state: &LockState) -> Self {
        match state {
            LockState::Absent => Self::Absent,
            LockState::Stale(info) => Self::Stale {
                pid: info.as_ref().map(|i| i.pid),
            },
            LockState::Live(info) => Self::Live {
                pid: info.pid,
                session_id: info.session_id.to_string(),
            },
        }
    }
}

/// Lock and recovery state of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// The image, made absolute.
    pub path: PathBuf,
    /// Crash-directory key.
    pub key: String,
    /// Lock marker state.
    pub lock: LockSummary,
    /// Recovery copy, if one exists.
    pub recovery_copy: Option<PathBuf>,
}

/// One crashed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryEntry {
    /// Crash-directory key.
    pub key: String,
    /// File being edited; `None` for untitled work.
    pub target: Option<PathBuf>,
    /// Recovery copy, if one exists.
    pub image: Option<PathBuf>,
    /// Process that crashed, if the marker was readable.
    pub pid: Option<u32>,
}

impl From<&RecoveryCandidate> for RecoveryEntry {
    fn from(candidate: &RecoveryCandidate) -> Self {
        Self {
            key: candidate.paths.key.clone(),
            target: candidate.target().map(PathBuf::from),
            image: candidate.has_image.then(|| candidate.paths.image.clone()),
            pid: candidate.info.as_ref().map(|i: &LockInfo| i.pid),
        }
    }
}

/// The result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Report {
    /// `new` wrote an image.
    Created {
        /// Written file.
        path: PathBuf,
        /// Width in cells.
        width: u32,
        /// Height in cells.
        height: u32,
    },
    /// `status` output.
    Status(StatusReport),
    /// `recover` restored a copy.
    Recovered {
        /// File the restored image was written to.
        path: PathBuf,
    },
    /// `recover --discard` output.
    Discarded {
        /// The image whose copy was discarded.
        path: PathBuf,
        /// Whether a copy existed.
        removed: bool,
    },
    /// `salvage` wrote a copy to a new file.
    Salvaged {
        /// Crash-directory key.
        key: String,
        /// Written file.
        output: PathBuf,
    },
    /// `list-recoveries` output.
    Recoveries(Vec<RecoveryEntry>),
}

impl Report {
    /// Render as text, or as one JSON document when `json` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, json: bool) -> serde_json::Result<String> {
        if json {
            serde_json::to_string_pretty(self)
        } else {
            Ok(self.to_string())
        }
    }
}

impl fmt::Display for LockSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "not locked"),
            Self::Stale { pid: Some(pid) } => write!(f, "stale (process {pid} is gone)"),
            Self::Stale { pid: None } => write!(f, "stale (unreadable marker)"),
            Self::Live { pid, session_id } => write!(f, "open in process {pid} (session {session_id})"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { path, width, height } => {
                write!(f, "Created {width}x{height} image {}", path.display())
            }
            Self::Status(status) => {
                writeln!(f, "{}", status.path.display())?;
                writeln!(f, "  key:      {}", status.key)?;
                writeln!(f, "  lock:     {}", status.lock)?;
                match &status.recovery_copy {
                    Some(copy) => write!(f, "  recovery: {}", copy.display()),
                    None => write!(f, "  recovery: none"),
                }
            }
            Self::Recovered { path } => write!(f, "Recovered {}", path.display()),
            Self::Discarded { path, removed: true } => {
                write!(f, "Discarded recovery copy for {}", path.display())
            }
            Self::Discarded { path, removed: false } => {
                write!(f, "No recovery copy for {}", path.display())
            }
            Self::Salvaged { key, output } => write!(f, "Wrote {key} to {}", output.display()),
            Self::Recoveries(entries) if entries.is_empty() => write!(f, "No crashed sessions"),
            Self::Recoveries(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let target = entry
                        .target
                        .as_ref()
                        .map_or_else(|| "untitled".to_string(), |t| t.display().to_string());
                    let copy = if entry.image.is_some() { "copy" } else { "no copy" };
                    write!(f, "{}  {target}  ({copy})", entry.key)?;
                }
                Ok(())
            }
        }
    }
}
