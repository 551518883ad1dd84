//! CLI command definitions
//!
//! Defines the clap commands for the e2e-runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a suite file (JSON or YAML)
    #[command(alias = "r")]
    Run {
        /// Path to the suite file
        path: PathBuf,

        /// Maximum number of contexts running at once
        /// (the suite's own `concurrentRunners` wins when set)
        #[arg(long, short = 'j')]
        concurrent_runners: Option<usize>,

        /// Pause before and after every step
        #[arg(long)]
        step_through: bool,

        /// Pause after a step that fails or errors
        #[arg(long)]
        break_on_fail: bool,

        /// Pause before the given step id
        /// Can be specified multiple times: --break login --break checkout
        #[arg(long = "break", short = 'b')]
        breakpoints: Vec<String>,

        /// Allow steps marked `unsafe` to run
        #[arg(long)]
        allow_unsafe: bool,

        /// Default step timeout in milliseconds
        #[arg(long)]
        step_timeout: Option<u64>,

        /// Write the JSON report to this file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write logs to the runner's log directory
        #[arg(long)]
        log_file: bool,

        /// Print every step, not only failing ones
        #[arg(long, short)]
        verbose: bool,
    },

    /// Load and validate a suite file without running it
    Validate {
        /// Path to the suite file
        path: PathBuf,
    },

    /// List the capabilities detected on this host
    Apps {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
