//! Logging and tracing configuration
//!
//! Logs are controlled by the `RUST_LOG` environment variable. When it is not
//! set, the level requested by the suite's `logLevel` is used.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::paths;

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize tracing for the CLI (stderr logging)
///
/// `default_directive` is an `EnvFilter` directive such as `e2e_runner=info,warn`.
pub fn init_cli(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(default_directive))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

/// Initialize tracing with an additional log file under the data directory
///
/// The returned guard must be held for the lifetime of the run so buffered
/// lines are flushed. Falls back to stderr only if the log directory cannot
/// be created.
pub fn init_with_file(default_directive: &str) -> Option<(PathBuf, WorkerGuard)> {
    let log_dir = match paths::ensure_log_dir() {
        Ok(Some(dir)) => dir,
        Ok(None) => {
            init_cli(default_directive);
            return None;
        }
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            init_cli(default_directive);
            return None;
        }
    };

    let appender = tracing_appender::rolling::never(&log_dir, "run.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter(default_directive))
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    Some((log_dir.join("run.log"), guard))
}
