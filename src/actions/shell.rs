//! `runShell` executor

use crate::engine::{ActionExecutor, ExecutionFailure, Outcome, RunnerDetails};
use crate::suite::StepAction;

use super::process::run_process;

/// Runs commands through the platform shell
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

/// Program and arguments for a command line plus extra arguments
///
/// On unix extra arguments are handed to the shell as positional
/// parameters, so they are never re-parsed.
pub fn shell_invocation(command: &str, args: &[String]) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        let mut line = command.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        ("cmd", vec!["/C".to_string(), line])
    } else if args.is_empty() {
        ("sh", vec!["-c".to_string(), command.to_string()])
    } else {
        let mut argv = vec![
            "-c".to_string(),
            format!("{} \"$@\"", command),
            "sh".to_string(),
        ];
        argv.extend(args.iter().cloned());
        ("sh", argv)
    }
}

#[async_trait::async_trait]
impl ActionExecutor for ShellExecutor {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure> {
        let StepAction::RunShell(shell) = action else {
            return Err(ExecutionFailure::new(format!(
                "shell executor cannot run {}",
                action.kind()
            )));
        };
        let (program, argv) = shell_invocation(&shell.command, &shell.args);
        run_process(program, &argv, shell.working_directory.as_deref()).await
    }
}
