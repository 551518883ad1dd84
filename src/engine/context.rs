//! Context runner
//!
//! Drives a context's steps strictly in order with a fresh variable store.
//! Failing steps do not stop the context; fatal steps and operator aborts
//! skip the remaining steps and mark the context as `error`.

use std::sync::Arc;

use crate::suite::{Context, DebugOptions};

use super::debug::{DebugController, DebugPrompt};
use super::report::{ContextReport, StepResult};
use super::step::StepRunner;
use super::variables::VariableStore;

/// Runs whole contexts
pub struct ContextRunner {
    steps: StepRunner,
    debug: DebugOptions,
    prompt: Arc<dyn DebugPrompt>,
}

impl ContextRunner {
    pub fn new(steps: StepRunner, debug: DebugOptions, prompt: Arc<dyn DebugPrompt>) -> Self {
        Self {
            steps,
            debug,
            prompt,
        }
    }

    /// Execute every step of `context` and build its report
    pub async fn run(&self, context: &Context) -> ContextReport {
        let context_id = context.id();
        let mut vars = VariableStore::new(&context.variables);
        let mut debug = DebugController::new(context_id, &self.debug, self.prompt.clone());
        let mut results: Vec<StepResult> = Vec::with_capacity(context.steps.len());
        let mut stop_reason: Option<String> = None;

        tracing::info!(steps = context.steps.len(), "Context started");

        for step in &context.steps {
            if stop_reason.is_some() {
                results.push(StepResult::skipped(step));
                continue;
            }

            let run = self.steps.run(step, &mut vars, &mut debug).await;

            if run.fatal {
                let message = run
                    .result
                    .failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_default();
                stop_reason = Some(format!("step '{}' is fatal: {}", step.id(), message));
            } else if debug.is_aborted() {
                stop_reason = Some(format!("aborted by operator at step '{}'", step.id()));
            }
            results.push(run.result);
        }

        let report = ContextReport::new(context_id, results, stop_reason);
        tracing::info!(result = ?report.result, "Context finished");
        report
    }
}
