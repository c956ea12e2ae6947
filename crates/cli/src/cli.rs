use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parallel reactor build scheduler.
///
/// Builds every module of a plan segment by segment on a fixed pool of
/// workers, stopping at the first failure.
#[derive(Parser, Debug)]
#[command(name = "pbuild", about = "Parallel reactor build scheduler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a build plan
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Requested number of worker threads (clamped to the module count)
        #[arg(long, env = "PBUILD_THREADS")]
        threads: Option<i64>,

        /// A failing module also raises the reactor halt signal
        #[arg(long)]
        fail_fast_halt: bool,

        /// Print the build summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the submission order of each segment without building
    Plan {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(clap::Args, Debug)]
pub struct CommonArgs {
    /// Path to the JSON build plan
    #[arg(long)]
    pub plan: PathBuf,

    /// Execution root; the priority file is looked up beneath it
    #[arg(long, env = "PBUILD_ROOT")]
    pub root: Option<PathBuf>,

    /// Explicit priority file (default: <root>/.pbuild/simple-parallel.json)
    #[arg(long, env = "PBUILD_PRIORITY_FILE")]
    pub priority_file: Option<PathBuf>,
}
