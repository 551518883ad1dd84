//! Child process helper shared by the shell and code executors

use std::process::Stdio;

use tokio::process::Command as TokioCommand;

use crate::engine::{ExecutionFailure, Outcome};

/// Exit code reported when a process was terminated by a signal
pub const SIGNAL_EXIT_CODE: i64 = -1;

/// Spawn `program` with `args`, wait for it and collect its output
///
/// The child is killed if the returned future is dropped, which is how step
/// timeouts cancel a running process.
pub async fn run_process(
    program: &str,
    args: &[String],
    working_directory: Option<&str>,
) -> Result<Outcome, ExecutionFailure> {
    let mut command = TokioCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_directory {
        command.current_dir(dir);
    }

    tracing::debug!(program, ?args, "Spawning process");

    let output = command
        .output()
        .await
        .map_err(|e| ExecutionFailure::new(format!("failed to run '{}': {}", program, e)))?;

    Ok(Outcome::Process {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output
            .status
            .code()
            .map(i64::from)
            .unwrap_or(SIGNAL_EXIT_CODE),
    })
}
