//! `runCode` executor
//!
//! Code is passed inline to the interpreter; nothing is written to disk.

use crate::engine::{ActionExecutor, ExecutionFailure, Outcome, RunnerDetails};
use crate::suite::{interpreter_app, StepAction};

use super::process::run_process;

/// Runs inline code through a language interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExecutor;

/// Program spawned for Python code
pub const PYTHON_PROGRAM: &str = "python3";

/// Interpreter program and arguments for `language`
pub fn interpreter_invocation(
    language: &str,
    code: &str,
    args: &[String],
) -> Option<(&'static str, Vec<String>)> {
    let (program, mut argv) = match interpreter_app(language)? {
        "python" => (PYTHON_PROGRAM, vec!["-c".to_string(), code.to_string()]),
        "node" => ("node", vec!["-e".to_string(), code.to_string()]),
        // sh and bash take $0 after the script
        "bash" => ("bash", vec!["-c".to_string(), code.to_string(), "bash".to_string()]),
        _ => ("sh", vec!["-c".to_string(), code.to_string(), "sh".to_string()]),
    };
    argv.extend(args.iter().cloned());
    Some((program, argv))
}

#[async_trait::async_trait]
impl ActionExecutor for CodeExecutor {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure> {
        let StepAction::RunCode(code) = action else {
            return Err(ExecutionFailure::new(format!(
                "code executor cannot run {}",
                action.kind()
            )));
        };
        let (program, argv) = interpreter_invocation(&code.language, &code.code, &code.args)
            .ok_or_else(|| {
                ExecutionFailure::new(format!("unsupported language '{}'", code.language))
            })?;
        run_process(program, &argv, code.working_directory.as_deref()).await
    }
}
