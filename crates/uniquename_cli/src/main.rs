//! Unique-name registry CLI
//!
//! Runs claim scripts against an in-memory registry, for trying out the
//! claim rules and for reproducing contention scenarios.
//!
//! # Commands
//!
//! - `run` - Execute a script of `take`/`lookup`/`transfer`/`release`/`list`
//!   lines from a file or stdin
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::run::{Format, RunOptions};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Unique-name registry tools.
#[derive(Parser)]
#[command(name = "uniquename")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Registry directory name
    #[arg(global = true, short, long, default_value = uniquename_core::DEFAULT_DIRECTORY)]
    directory: String,

    /// Compare names exactly instead of case-folding them
    #[arg(global = true, long)]
    identity: bool,

    /// Refuse transfers from owners whose claim has expired
    #[arg(global = true, long)]
    strict_transfers: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script, one command per line
    Run {
        /// Script file; stdin when omitted or `-`
        script: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so script output stays clean.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { script } => {
            let options = RunOptions {
                directory: cli.directory,
                identity: cli.identity,
                strict_transfers: cli.strict_transfers,
                format: Format::from_arg(&cli.format),
            };
            let summary = commands::run::run_path(script.as_deref(), &options)?;
            info!(
                commands = summary.commands,
                refused = summary.refused,
                "script complete"
            );
        }
        Commands::Version => {
            println!("uniquename CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("uniquename core v{}", uniquename_core::VERSION);
        }
    }

    Ok(())
}
