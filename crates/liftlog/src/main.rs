//! LiftLog - conversational workout coach and training log
//!
//! Main entry point for the LiftLog CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{export, start, summary};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// LiftLog - conversational workout coach and training log
#[derive(Parser)]
#[command(name = "liftlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml (overrides LIFTLOG_CONFIG_DIR)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the LiftLog server
    Start(start::StartArgs),

    /// Write a user's workouts to their export file
    Export(export::ExportArgs),

    /// Print per-type totals and personal records
    Summary(summary::SummaryArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "liftlog=debug,liftlog_server=debug,liftlog_llm=debug,liftlog_extract=debug,liftlog_store=debug,liftlog_session=debug,info"
    } else {
        "liftlog=info,liftlog_server=info,liftlog_llm=info,liftlog_extract=info,liftlog_store=info,warn"
    };

    let log_dir = liftlog_config::default_data_dir().join("logs");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "liftlog.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "liftlog=trace,liftlog_server=debug,liftlog_llm=debug,liftlog_extract=debug,liftlog_store=debug,liftlog_session=debug,info",
                )),
        )
        .init();

    let mut loaded =
        liftlog_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    loaded.config.apply_env_overrides();
    loaded.config.validate()?;

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }
    if cli.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            eprintln!("No config files found, using defaults");
        } else {
            for source in sources {
                eprintln!("Loaded config: {}", source.display());
            }
        }
    }

    let ctx = commands::Context {
        config: loaded.config,
        data_dir: liftlog_config::default_data_dir(),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Export(args) => export::run(args, &ctx).await,
        Commands::Summary(args) => summary::run(args, &ctx).await,
    }
}
