//! # Dixel
//!
//! Command-line entry point.

use clap::Parser;
use dixel_cli::{CliArgs, CliConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,dixel_core=debug,dixel_cli=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dixel_core=debug,dixel_cli=debug"));

    // Reports go to stdout; logs stay on stderr.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = CliConfig::load(&args)?;
    tracing::debug!(
        "Crash directory: {}",
        config.editor.persistence.crash_dir.display()
    );

    let report = dixel_cli::run(&args.command, &config)?;
    println!("{}", report.render(config.json)?);
    Ok(())
}
