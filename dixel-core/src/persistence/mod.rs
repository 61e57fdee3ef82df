//! Explicit save, periodic autosave, lock markers and crash recovery.
//!
//! ## Session lifecycle
//!
//! ```text
//!   open / new_untitled ──► lock marker created (or stale one taken over)
//!        │
//!        ├── autosave_tick ──► bound file  (or recovery copy when untitled)
//!        ├── save / save_as ──► bound file, recovery copy removed
//!        ├── emergency_save ──► recovery copy, marker kept
//!        │
//!   close ──► pending changes flushed, marker and recovery copy removed
//! ```
//!
//! A failed write never touches the grid, its dirty flag or the marker, so
//! the caller can report the error and retry.

pub mod lock;
pub mod recovery;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::codec::{normalize_image_path, ImageCodec, RasterCodec};
use crate::config::{GridLimits, PersistenceConfig};
use crate::error::{EditorError, EditorResult};
use crate::grid::PixelGrid;

pub use lock::{LockInfo, LockMarker, LockState};
pub use recovery::{RecoveryCandidate, RecoveryPaths};

/// What the controller knows about the grid's persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistenceRecord {
    /// Bound file; `None` for a grid never explicitly saved.
    pub target: Option<PathBuf>,
    /// Content hash at the last successful write to `target`.
    pub synced_hash: Option<u64>,
    /// Directory for lock markers and recovery copies.
    pub crash_dir: PathBuf,
}

/// A crash-recovery copy offered when a file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOffer {
    /// The recovery copy.
    pub image: PathBuf,
    /// Contents of the stale marker, if readable.
    pub previous: Option<LockInfo>,
}

/// Result of [`PersistenceController::open`].
#[derive(Debug)]
pub struct OpenedFile {
    /// The decoded file.
    pub grid: PixelGrid,
    /// A recovery copy left by a crashed session, if any.
    pub recovery: Option<RecoveryOffer>,
    /// The live session holding the file, if another process has it open.
    /// This session then runs without a marker of its own, and its recovery
    /// copy lives under a private key so the holder's files are never
    /// touched.
    pub conflict: Option<LockInfo>,
}

/// What an autosave tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// The interval has not elapsed.
    NotDue,
    /// A tool action is open; run [`PersistenceController::autosave_now`]
    /// once it commits.
    Deferred,
    /// Nothing new to write.
    Clean,
    /// Written to the bound file.
    SavedToTarget(PathBuf),
    /// Written to the recovery copy (untitled grid).
    SavedToRecovery(PathBuf),
}

/// Owns the persistence side of one editing session.
#[derive(Debug)]
pub struct PersistenceController<C = RasterCodec> {
    codec: C,
    config: PersistenceConfig,
    limits: GridLimits,
    session_id: Uuid,
    record: PersistenceRecord,
    paths: RecoveryPaths,
    marker: Option<LockMarker>,
    recovery_hash: Option<u64>,
    last_autosave: Instant,
    closed: bool,
}

impl PersistenceController<RasterCodec> {
    /// Start an untitled session with the PNG/BMP codec.
    ///
    /// # Errors
    ///
    /// See [`PersistenceController::new_untitled_with`].
    pub fn new_untitled(config: PersistenceConfig, limits: GridLimits) -> EditorResult<Self> {
        Self::new_untitled_with(RasterCodec, config, limits)
    }

    /// Open `path` with the PNG/BMP codec.
    ///
    /// # Errors
    ///
    /// See [`PersistenceController::open_with`].
    pub fn open(
        path: &Path,
        config: PersistenceConfig,
        limits: GridLimits,
    ) -> EditorResult<(Self, OpenedFile)> {
        Self::open_with(RasterCodec, path, config, limits)
    }
}

impl<C: ImageCodec> PersistenceController<C> {
    fn bare(codec: C, config: PersistenceConfig, limits: GridLimits, target: Option<PathBuf>) -> Self {
        let session_id = Uuid::new_v4();
        let paths = RecoveryPaths::for_session(&config.crash_dir, target.as_deref(), session_id);
        Self {
            codec,
            record: PersistenceRecord {
                target,
                synced_hash: None,
                crash_dir: config.crash_dir.clone(),
            },
            config,
            limits,
            session_id,
            paths,
            marker: None,
            recovery_hash: None,
            last_autosave: Instant::now(),
            closed: false,
        }
    }

    fn ensure_crash_dir(&self) -> EditorResult<()> {
        std::fs::create_dir_all(&self.record.crash_dir)
            .map_err(|e| EditorError::io(&self.record.crash_dir, e))
    }

    /// Start a session for a grid that has never been saved.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the crash directory or marker cannot
    /// be created.
    pub fn new_untitled_with(codec: C, config: PersistenceConfig, limits: GridLimits) -> EditorResult<Self> {
        let mut controller = Self::bare(codec, config, limits, None);
        controller.ensure_crash_dir()?;
        let info = LockInfo::current(controller.session_id, None);
        controller.marker = LockMarker::try_acquire(&controller.paths.lock, info)?;
        tracing::info!(session = %controller.session_id, "Started untitled session");
        Ok(controller)
    }

    /// Decode `path` and start a session bound to it.
    ///
    /// A stale marker is reported as a [`RecoveryOffer`] when its recovery
    /// copy exists and is replaced by ours. A live marker is reported as a
    /// conflict and left alone.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] or [`EditorError::CorruptSource`] if the
    /// file cannot be decoded (no marker is touched in that case), and
    /// [`EditorError::Io`] if the marker cannot be created.
    pub fn open_with(
        codec: C,
        path: &Path,
        config: PersistenceConfig,
        limits: GridLimits,
    ) -> EditorResult<(Self, OpenedFile)> {
        let grid = codec.decode(path, &limits)?;
        let target = recovery::absolute_path(&normalize_image_path(path));
        let mut controller = Self::bare(codec, config, limits, Some(target));
        controller.ensure_crash_dir()?;
        controller.record.synced_hash = Some(grid.content_hash());

        let (recovery, conflict) = controller.claim_marker()?;
        tracing::info!(
            session = %controller.session_id,
            recovery = recovery.is_some(),
            conflict = conflict.is_some(),
            "Opened {}",
            path.display()
        );
        Ok((
            controller,
            OpenedFile {
                grid,
                recovery,
                conflict,
            },
        ))
    }

    /// Acquire the marker for the current paths, classifying whatever is
    /// already there.
    fn claim_marker(&mut self) -> EditorResult<(Option<RecoveryOffer>, Option<LockInfo>)> {
        let info = LockInfo::current(self.session_id, self.record.target.clone());
        let mut recovery = None;
        let mut conflict = None;

        match lock::inspect(&self.paths.lock)? {
            LockState::Absent => {
                self.marker = LockMarker::try_acquire(&self.paths.lock, info)?;
            }
            LockState::Stale(previous) => {
                tracing::warn!(
                    "Stale lock marker {} found; previous session crashed",
                    self.paths.lock.display()
                );
                if self.paths.has_image() {
                    recovery = Some(RecoveryOffer {
                        image: self.paths.image.clone(),
                        previous,
                    });
                }
                self.marker = LockMarker::take_over(&self.paths.lock, info)?;
            }
            LockState::Live(holder) => {
                tracing::warn!(pid = holder.pid, "File is open in another session");
                conflict = Some(holder);
            }
        }

        if self.marker.is_none() && conflict.is_none() {
            // Lost a create race to another process.
            if let LockState::Live(holder) = lock::inspect(&self.paths.lock)? {
                conflict = Some(holder);
            }
        }
        if conflict.is_some() {
            self.paths =
                RecoveryPaths::for_guest(&self.record.crash_dir, &self.paths.key, self.session_id);
            tracing::debug!("Using private recovery key {}", self.paths.key);
        }
        Ok((recovery, conflict))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// This session's identifier.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The persisted-state record.
    #[must_use]
    pub const fn record(&self) -> &PersistenceRecord {
        &self.record
    }

    /// The bound file, if any.
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        self.record.target.as_deref()
    }

    /// Marker and recovery-copy paths for this session.
    #[must_use]
    pub const fn paths(&self) -> &RecoveryPaths {
        &self.paths
    }

    /// Whether this session holds the lock marker for its file.
    #[must_use]
    pub const fn owns_lock(&self) -> bool {
        self.marker.is_some()
    }

    /// Whether [`PersistenceController::close`] has completed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The injected configuration.
    #[must_use]
    pub const fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Whether `grid` differs from the last write to the bound file.
    #[must_use]
    pub fn has_unsynced_changes(&self, grid: &PixelGrid) -> bool {
        grid.is_dirty() && self.record.synced_hash != Some(grid.content_hash())
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    /// Load a recovery copy. The result is marked dirty: it has not been
    /// written to the bound file yet. The copy stays on disk until the next
    /// successful save.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] or [`EditorError::CorruptSource`] if the
    /// copy cannot be decoded.
    pub fn restore_recovery(&mut self, offer: &RecoveryOffer) -> EditorResult<PixelGrid> {
        let mut grid = self.codec.decode(&offer.image, &self.limits)?;
        grid.mark_dirty();
        tracing::info!("Restored recovery copy {}", offer.image.display());
        Ok(grid)
    }

    /// Delete this session's recovery copy.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the file exists but cannot be removed.
    pub fn discard_recovery(&mut self) -> EditorResult<()> {
        if recovery::remove_if_exists(&self.paths.image)? {
            tracing::info!("Discarded recovery copy {}", self.paths.image.display());
        }
        self.recovery_hash = None;
        Ok(())
    }

    /// List crashed sessions in `crash_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the directory cannot be read.
    pub fn scan_recoveries(crash_dir: &Path) -> EditorResult<Vec<RecoveryCandidate>> {
        recovery::scan(crash_dir)
    }

    // -----------------------------------------------------------------------
    // Autosave
    // -----------------------------------------------------------------------

    /// Whether the autosave interval has elapsed at `now`.
    #[must_use]
    pub fn autosave_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_autosave) >= self.config.autosave_interval()
    }

    /// Timer entry point. Writes only when the interval has elapsed, no tool
    /// action is open (`recording`) and the grid is dirty.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the write fails; the next attempt
    /// happens one interval later.
    pub fn autosave_tick(
        &mut self,
        grid: &mut PixelGrid,
        now: Instant,
        recording: bool,
    ) -> EditorResult<AutosaveOutcome> {
        if !self.autosave_due(now) {
            return Ok(AutosaveOutcome::NotDue);
        }
        if recording {
            tracing::debug!("Autosave deferred until the open action commits");
            return Ok(AutosaveOutcome::Deferred);
        }
        self.last_autosave = now;
        self.autosave_now(grid)
    }

    /// Autosave immediately, ignoring the interval.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the write fails.
    pub fn autosave_now(&mut self, grid: &mut PixelGrid) -> EditorResult<AutosaveOutcome> {
        if !grid.is_dirty() {
            return Ok(AutosaveOutcome::Clean);
        }
        let hash = grid.content_hash();
        match self.record.target.clone() {
            Some(target) => {
                if self.record.synced_hash == Some(hash) {
                    grid.mark_clean();
                    return Ok(AutosaveOutcome::Clean);
                }
                self.write_target(grid, &target)?;
                tracing::info!("Autosaved to {}", target.display());
                Ok(AutosaveOutcome::SavedToTarget(target))
            }
            None => {
                if self.recovery_hash == Some(hash) {
                    return Ok(AutosaveOutcome::Clean);
                }
                self.codec.encode(grid, &self.paths.image)?;
                self.recovery_hash = Some(hash);
                tracing::info!("Autosaved untitled grid to {}", self.paths.image.display());
                Ok(AutosaveOutcome::SavedToRecovery(self.paths.image.clone()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Explicit save
    // -----------------------------------------------------------------------

    /// Write to `target`, then mark the grid clean and drop the recovery copy.
    fn write_target(&mut self, grid: &mut PixelGrid, target: &Path) -> EditorResult<()> {
        self.codec.encode(grid, target)?;
        grid.mark_clean();
        self.record.synced_hash = Some(grid.content_hash());
        self.remove_recovery_copy();
        Ok(())
    }

    fn remove_recovery_copy(&mut self) {
        remove_quietly(&self.paths.image);
        self.recovery_hash = None;
    }

    /// Save to the bound file. An untitled grid is saved as the first free
    /// `new_file[_n].png` in the configured untitled directory.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the write fails; nothing else changes.
    pub fn save(&mut self, grid: &mut PixelGrid) -> EditorResult<PathBuf> {
        match self.record.target.clone() {
            Some(target) => {
                self.write_target(grid, &target)?;
                tracing::info!("Saved {}", target.display());
                Ok(target)
            }
            None => {
                let path = next_untitled_path(&self.config.untitled_dir);
                self.save_as(grid, &path)
            }
        }
    }

    /// Save to `path` (normalized to a supported extension) and rebind the
    /// session to it, moving the lock marker.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the write fails or the new marker
    /// cannot be created; the session stays bound to its previous file and
    /// keeps its marker.
    pub fn save_as(&mut self, grid: &mut PixelGrid, path: &Path) -> EditorResult<PathBuf> {
        let target = recovery::absolute_path(&normalize_image_path(path));
        if self.record.target.as_deref() == Some(target.as_path()) {
            return self.save(grid);
        }

        self.codec.encode(grid, &target)?;

        // Written: claim the new path, keeping the old session files until
        // that succeeds.
        let new_paths =
            RecoveryPaths::for_session(&self.record.crash_dir, Some(&target), self.session_id);
        let old_paths = std::mem::replace(&mut self.paths, new_paths);
        let old_marker = self.marker.take();
        let old_target = self.record.target.replace(target.clone());
        let conflict = match self.claim_marker() {
            Ok((_, conflict)) => conflict,
            Err(e) => {
                self.paths = old_paths;
                self.marker = old_marker;
                self.record.target = old_target;
                return Err(e);
            }
        };
        if conflict.is_some() {
            tracing::warn!("Saved as {} while another session has it open", target.display());
        }

        remove_quietly(&old_paths.image);
        if let Some(marker) = old_marker {
            release_quietly(marker);
        }
        grid.mark_clean();
        self.record.synced_hash = Some(grid.content_hash());
        // A stale copy under the new key predates this save.
        self.remove_recovery_copy();
        tracing::info!("Saved as {}", target.display());
        Ok(target)
    }

    fn release_marker(&mut self) {
        if let Some(marker) = self.marker.take() {
            release_quietly(marker);
        }
    }

    /// Write the recovery copy and keep the marker, for an abnormal exit.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the write fails.
    pub fn emergency_save(&mut self, grid: &PixelGrid) -> EditorResult<PathBuf> {
        self.ensure_crash_dir()?;
        self.codec.encode(grid, &self.paths.image)?;
        self.recovery_hash = Some(grid.content_hash());
        tracing::warn!("Emergency save to {}", self.paths.image.display());
        Ok(self.paths.image.clone())
    }

    /// End the session: flush unsaved changes, then remove the marker and
    /// the recovery copy. Returns the path flushed to, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Io`] if the flush fails; the marker and
    /// recovery copy are kept and `close` can be retried.
    pub fn close(&mut self, grid: &mut PixelGrid) -> EditorResult<Option<PathBuf>> {
        if self.closed {
            return Ok(None);
        }
        let flushed = if grid.is_dirty() {
            Some(self.save(grid)?)
        } else {
            None
        };
        self.remove_recovery_copy();
        self.release_marker();
        self.closed = true;
        tracing::info!(session = %self.session_id, "Closed session");
        Ok(flushed)
    }
}

fn remove_quietly(path: &Path) {
    match recovery::remove_if_exists(path) {
        Ok(true) => tracing::debug!("Removed recovery copy {}", path.display()),
        Ok(false) => {}
        Err(e) => tracing::warn!("Failed to remove recovery copy: {e}"),
    }
}

fn release_quietly(marker: LockMarker) {
    if let Err(e) = marker.release() {
        tracing::warn!("Failed to remove lock marker: {e}");
    }
}

/// The first `new_file.png`, `new_file_1.png`, ... not present in `dir`.
#[must_use]
pub fn next_untitled_path(dir: &Path) -> PathBuf {
    let first = dir.join("new_file.png");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("new_file_{n}.png")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
