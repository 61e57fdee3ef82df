//! # Dixel CLI
//!
//! Headless command-line host for the Dixel grid engine.
//!
//! ## Usage
//!
//! ```bash
//! # Create a blank 32x32 image
//! dixel new sprite.png --width 32 --height 32
//!
//! # Is the file open somewhere, and is there a recovery copy?
//! dixel status sprite.png
//!
//! # Restore (or throw away) the copy a crashed session left behind
//! dixel recover sprite.png
//! dixel recover sprite.png --discard
//!
//! # Everything waiting in the crash directory
//! dixel list-recoveries
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `CliConfig` - Engine configuration plus command-line overrides
//! - `commands` - One function per subcommand, each returning a `Report`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod commands;
mod report;

pub use commands::run;
pub use report::{LockSummary, RecoveryEntry, Report, StatusReport};

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dixel_core::{Color, EditorConfig};

/// Command-line arguments for dixel.
#[derive(Debug, Clone, Parser)]
#[command(name = "dixel")]
#[command(about = "Pixel-art grid editor: images, lock markers and crash recovery")]
#[command(version)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(long, env = "DIXEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for lock markers and recovery copies
    #[arg(long, env = "DIXEL_CRASH_DIR")]
    pub crash_dir: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a blank image
    New {
        /// Output file; `.png` is appended unless it ends in `.png` or `.bmp`
        path: PathBuf,
        /// Width in cells (configured default if omitted)
        #[arg(long)]
        width: Option<u32>,
        /// Height in cells (configured default if omitted)
        #[arg(long)]
        height: Option<u32>,
        /// Fill color as `#RRGGBB` or `#RRGGBBAA`
        #[arg(long)]
        fill: Option<Color>,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the lock marker and recovery copy for an image
    Status {
        /// Image file
        path: PathBuf,
    },
    /// Restore the recovery copy a crashed session left for an image
    Recover {
        /// Image file
        path: PathBuf,
        /// Delete the recovery copy instead of restoring it
        #[arg(long)]
        discard: bool,
        /// Write the restored image here instead of over the original
        #[arg(long, conflicts_with = "discard")]
        output: Option<PathBuf>,
    },
    /// Write a recovery copy to a new file by key, for untitled or moved work
    Salvage {
        /// Crash-directory key, as shown by `list-recoveries`
        key: String,
        /// Output file
        output: PathBuf,
    },
    /// List crashed sessions in the crash directory
    ListRecoveries,
}

/// Engine configuration after command-line overrides.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Engine configuration.
    pub editor: EditorConfig,
    /// Render reports as JSON.
    pub json: bool,
}

impl CliConfig {
    /// Load the configuration file (if any) and apply overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or is
    /// invalid.
    pub fn load(args: &CliArgs) -> anyhow::Result<Self> {
        let mut editor = match &args.config {
            Some(path) => EditorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => EditorConfig::default(),
        };
        if let Some(dir) = &args.crash_dir {
            editor.persistence.crash_dir.clone_from(dir);
        }
        Ok(Self {
            editor,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_with_fill() {
        let args = CliArgs::try_parse_from([
            "dixel", "new", "a.png", "--width", "8", "--height", "4", "--fill", "#FF000080",
        ])
        .expect("parse");
        let Command::New {
            width, height, fill, ..
        } = args.command
        else {
            panic!("expected new");
        };
        assert_eq!((width, height), (Some(8), Some(4)));
        assert_eq!(fill, Some(Color::rgba(255, 0, 0, 0x80)));
    }

    #[test]
    fn test_parse_rejects_bad_color() {
        assert!(CliArgs::try_parse_from(["dixel", "new", "a.png", "--fill", "red"]).is_err());
    }

    #[test]
    fn test_discard_conflicts_with_output() {
        let parsed =
            CliArgs::try_parse_from(["dixel", "recover", "a.png", "--discard", "--output", "b.png"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_crash_dir_override() {
        let args =
            CliArgs::try_parse_from(["dixel", "--crash-dir", "/tmp/dixel-crash", "list-recoveries"])
                .expect("parse");
        let config = CliConfig::load(&args).expect("load");
        assert_eq!(
            config.editor.persistence.crash_dir,
            PathBuf::from("/tmp/dixel-crash")
        );
    }

    #[test]
    fn test_config_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dixel.json");
        std::fs::write(&path, r#"{"grid": {"default_width": 12}}"#).expect("write");
        let args = CliArgs::try_parse_from([
            "dixel",
            "--config",
            path.to_str().expect("utf8"),
            "list-recoveries",
        ])
        .expect("parse");
        let config = CliConfig::load(&args).expect("load");
        assert_eq!(config.editor.grid.default_width, 12);
        assert_eq!(config.editor.grid.default_height, 64);
    }

    #[test]
    fn test_invalid_config_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dixel.json");
        std::fs::write(&path, "{ not json").expect("write");
        let args = CliArgs::try_parse_from([
            "dixel",
            "--config",
            path.to_str().expect("utf8"),
            "list-recoveries",
        ])
        .expect("parse");
        assert!(CliConfig::load(&args).is_err());
    }
}
