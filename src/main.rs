//! e2e-runner - run hierarchical end-to-end suites
//!
//! Loads a JSON or YAML suite, runs its contexts with bounded concurrency and
//! reports pass/fail/error per spec, test, context and step.

use clap::Parser;
use commands::Commands;
use e2e_runner::{cli, commands};

#[derive(Parser)]
#[command(name = "e2e-runner", about = "Hierarchical end-to-end test runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Logging is initialized per command, once the suite's log level is known
    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
