//! Subcommand implementations.

use std::path::Path;

use anyhow::{bail, Context};
use dixel_core::codec::normalize_image_path;
use dixel_core::persistence::lock;
use dixel_core::persistence::recovery::{self, RecoveryPaths};
use dixel_core::{Color, Editor, ImageCodec, LockState, PersistenceController, RasterCodec};

use crate::report::{LockSummary, RecoveryEntry, Report, StatusReport};
use crate::{CliConfig, Command};

/// Run one command.
///
/// # Errors
///
/// Returns an error describing what failed; nothing is left half-written.
pub fn run(command: &Command, config: &CliConfig) -> anyhow::Result<Report> {
    match command {
        Command::New {
            path,
            width,
            height,
            fill,
            force,
        } => new_image(config, path, *width, *height, *fill, *force),
        Command::Status { path } => status(config, path),
        Command::Recover {
            path,
            discard: true,
            ..
        } => discard(config, path),
        Command::Recover { path, output, .. } => recover(config, path, output.as_deref()),
        Command::Salvage { key, output } => salvage(config, key, output),
        Command::ListRecoveries => list_recoveries(config),
    }
}

fn new_image(
    config: &CliConfig,
    path: &Path,
    width: Option<u32>,
    height: Option<u32>,
    fill: Option<Color>,
    force: bool,
) -> anyhow::Result<Report> {
    let limits = config.editor.grid;
    let width = width.unwrap_or(limits.default_width);
    let height = height.unwrap_or(limits.default_height);
    let target = normalize_image_path(path);
    if target.exists() && !force {
        bail!("{} already exists (use --force to replace it)", target.display());
    }

    let mut editor = Editor::new_untitled(config.editor.clone(), width, height, (width, height))
        .context("Failed to create grid")?;
    if let Some(color) = fill {
        editor.clear(color).context("Failed to fill grid")?;
    }
    let written = editor
        .save_as(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    editor.close().context("Failed to close session")?;
    tracing::info!("Created {width}x{height} image {}", written.display());
    Ok(Report::Created {
        path: written,
        width,
        height,
    })
}

fn paths_for(config: &CliConfig, path: &Path) -> RecoveryPaths {
    let target = recovery::absolute_path(&normalize_image_path(path));
    RecoveryPaths::new(&config.editor.persistence.crash_dir, recovery::target_key(&target))
}

fn status(config: &CliConfig, path: &Path) -> anyhow::Result<Report> {
    let paths = paths_for(config, path);
    let state = lock::inspect(&paths.lock)
        .with_context(|| format!("Failed to read lock marker {}", paths.lock.display()))?;
    Ok(Report::Status(StatusReport {
        path: recovery::absolute_path(&normalize_image_path(path)),
        lock: LockSummary::from(&state),
        recovery_copy: paths.has_image().then(|| paths.image.clone()),
        key: paths.key,
    }))
}

fn ensure_not_live(paths: &RecoveryPaths, what: &str) -> anyhow::Result<()> {
    if let LockState::Live(holder) = lock::inspect(&paths.lock)? {
        bail!(
            "{what} is open in process {} (session {}); close it first",
            holder.pid,
            holder.session_id
        );
    }
    Ok(())
}

fn discard(config: &CliConfig, path: &Path) -> anyhow::Result<Report> {
    let paths = paths_for(config, path);
    ensure_not_live(&paths, &path.display().to_string())?;
    let removed = recovery::remove_if_exists(&paths.image)?;
    recovery::remove_if_exists(&paths.lock)?;
    tracing::info!(removed, "Discarded recovery state for {}", path.display());
    Ok(Report::Discarded {
        path: recovery::absolute_path(&normalize_image_path(path)),
        removed,
    })
}

fn recover(config: &CliConfig, path: &Path, output: Option<&Path>) -> anyhow::Result<Report> {
    let mut editor = Editor::open(config.editor.clone(), path, (1, 1))
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if let Some(holder) = editor.conflict() {
        bail!(
            "{} is open in process {} (session {}); close it first",
            path.display(),
            holder.pid,
            holder.session_id
        );
    }
    if !editor.accept_recovery().context("Failed to load recovery copy")? {
        editor.close()?;
        bail!("No recovery copy for {}", path.display());
    }

    let written = match output {
        Some(output) => editor.save_as(output)?,
        None => editor.save()?,
    };
    editor.close()?;
    Ok(Report::Recovered { path: written })
}

fn salvage(config: &CliConfig, key: &str, output: &Path) -> anyhow::Result<Report> {
    let paths = RecoveryPaths::new(&config.editor.persistence.crash_dir, key);
    ensure_not_live(&paths, key)?;
    if !paths.has_image() {
        bail!("No recovery copy with key {key}");
    }

    let codec = RasterCodec;
    let grid = codec
        .decode(&paths.image, &config.editor.grid)
        .with_context(|| format!("Failed to read {}", paths.image.display()))?;
    let output = normalize_image_path(output);
    codec
        .encode(&grid, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    recovery::remove_if_exists(&paths.image)?;
    recovery::remove_if_exists(&paths.lock)?;
    tracing::info!("Salvaged {key} to {}", output.display());
    Ok(Report::Salvaged {
        key: key.to_string(),
        output,
    })
}

fn list_recoveries(config: &CliConfig) -> anyhow::Result<Report> {
    let crash_dir = &config.editor.persistence.crash_dir;
    let found = PersistenceController::<RasterCodec>::scan_recoveries(crash_dir)
        .with_context(|| format!("Failed to scan {}", crash_dir.display()))?;
    Ok(Report::Recoveries(found.iter().map(RecoveryEntry::from).collect()))
}
