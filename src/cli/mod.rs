//! Command-line plumbing shared by the `aoi-slice` binaries
//!
//! Flag definitions common to both modes, logging setup, and the mapping
//! from a failed run to a process exit status.

pub mod progress;

pub use progress::ProgressManager;

use anyhow::Context;
use clap::Args;
use log::LevelFilter;

use crate::core::config::{DatabaseConfig, DEFAULT_DATABASE_URL};
use crate::core::exporter::{ExportSummary, OutputFormat};

/// Flags shared by every export command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// PostgreSQL connection URL for the routing database
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, hide_env_values = true)]
    pub database_url: String,

    /// Print the export summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn database(&self) -> anyhow::Result<DatabaseConfig> {
        DatabaseConfig::new(&self.database_url).context("invalid --database-url")
    }
}

/// Initialize logging to stderr; `RUST_LOG` overrides the default level
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

/// Exit status for a failed run
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<crate::Error>())
        .map_or(1, crate::Error::exit_code)
}

/// Report a finished export: status line on stderr, JSON on stdout if asked
pub fn report_summary(summary: &ExportSummary, json: bool) -> anyhow::Result<()> {
    match summary.format {
        OutputFormat::Graphml => eprintln!(
            "✅ Wrote {} nodes and {} edges to {}",
            summary.nodes,
            summary.edges,
            summary.output.display()
        ),
        OutputFormat::TileArchive => eprintln!(
            "✅ Packaged {} tile files ({} edges) into {}",
            summary.tile_files.unwrap_or(0),
            summary.edges,
            summary.output.display()
        ),
    }
    eprintln!("  ✓ SHA-256: {}", summary.sha256);
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
