//! Step runner
//!
//! Runs one step: pass the pre-step gate, resolve variables, check
//! capabilities, dispatch with an optional timeout, evaluate the outcome,
//! capture variables and pass the post-step gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::suite::{Step, StepAction};

use super::debug::{DebugController, DebugDecision};
use super::executor::{ExecutorRegistry, Outcome, RunnerDetails};
use super::failure::{FailureKind, StepFailure};
use super::matcher::match_partial;
use super::report::{StepResult, StepStatus};
use super::variables::VariableStore;

/// Result of running a step, plus whether the context must stop
#[derive(Debug, Clone)]
pub struct StepRun {
    pub result: StepResult,
    /// Remaining steps must be skipped
    pub fatal: bool,
}

/// Runs single steps against a registry of executors
pub struct StepRunner {
    registry: Arc<ExecutorRegistry>,
    details: RunnerDetails,
    default_timeout: Option<Duration>,
}

impl StepRunner {
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        details: RunnerDetails,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            details,
            default_timeout,
        }
    }

    /// Run one step
    pub async fn run(
        &self,
        step: &Step,
        vars: &mut VariableStore,
        debug: &mut DebugController,
    ) -> StepRun {
        let start = Instant::now();
        let step_id = step.id().to_string();
        let description = step.describe();

        let mut result = StepResult {
            step_id: step_id.clone(),
            description: description.clone(),
            result: StepStatus::Pass,
            duration_ms: 0,
            variables: Map::new(),
            failure: None,
            capture_failures: Vec::new(),
            outcome: None,
        };
        let mut fatal = false;

        // The pre-step gate sees every step, including ones whose variables
        // cannot be resolved.
        match debug.before_step(&step_id, &description).await {
            DebugDecision::Skip | DebugDecision::Abort => {
                result.result = StepStatus::Skipped;
                return StepRun { result, fatal };
            }
            DebugDecision::Continue => {}
        }

        match vars.resolve_action(&step.action) {
            Err(failure) => {
                tracing::debug!(step = %step_id, "{}", failure);
                result.result = failure.status();
                result.failure = Some(failure);
            }
            Ok(action) => match self.dispatch(step, &action).await {
                Ok(outcome) => {
                    let view = outcome.to_value();
                    if let Err(failure) = evaluate(&action, &outcome, &view) {
                        result.result = failure.status();
                        result.failure = Some(failure);
                    }
                    if !step.variables.is_empty() {
                        let (captured, failures) = vars.capture(&step.variables, &view);
                        for failure in &failures {
                            tracing::warn!(
                                step = %step_id,
                                variable = %failure.variable,
                                "Capture failed: {}",
                                failure.reason
                            );
                        }
                        result.variables = captured;
                        result.capture_failures = failures;
                    }
                    result.outcome = Some(view);
                }
                Err(failure) => {
                    fatal = failure.kind.is_fatal();
                    result.result = failure.status();
                    result.failure = Some(failure);
                }
            },
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            step = %step_id,
            result = ?result.result,
            duration_ms = result.duration_ms,
            "Step finished"
        );

        // A post-step abort is picked up by the context runner via the
        // controller state.
        debug
            .after_step(&step_id, &description, result.result)
            .await;

        StepRun { result, fatal }
    }

    /// Check capabilities and invoke the executor
    async fn dispatch(&self, step: &Step, action: &StepAction) -> Result<Outcome, StepFailure> {
        let kind = action.kind();

        if step.is_unsafe && !self.details.allow_unsafe_steps {
            return Err(StepFailure::new(
                FailureKind::UnsafeStepRejected,
                format!(
                    "step '{}' is marked unsafe and unsafe steps are not allowed",
                    step.id()
                ),
            ));
        }

        if let Some(app) = action.required_app() {
            if !self.details.has_app(&app) {
                return Err(StepFailure::new(
                    FailureKind::UnsupportedCapability,
                    format!("{} requires '{}', which is not available", kind, app),
                ));
            }
        }

        let executor = self.registry.get(kind).ok_or_else(|| {
            StepFailure::new(
                FailureKind::UnsupportedCapability,
                format!("no executor registered for {}", kind),
            )
        })?;

        tracing::debug!(step = %step.id(), %kind, "Dispatching");
        let call = executor.execute(action, &self.details);

        let timeout = step
            .timeout
            .map(Duration::from_millis)
            .or(self.default_timeout);

        let outcome = match timeout {
            // Dropping the future on timeout cancels the invocation
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(StepFailure::timeout(limit.as_millis())),
            },
            None => call.await,
        };

        outcome.map_err(|e| StepFailure::new(FailureKind::ExecutionFailure, e.message))
    }
}

/// Check exit codes, status codes, expected output and the expected pattern
fn evaluate(action: &StepAction, outcome: &Outcome, view: &Value) -> Result<(), StepFailure> {
    if let (Some(permitted), Outcome::Process { exit_code, .. }) =
        (action.permitted_exit_codes(), outcome)
    {
        if !permitted.contains(exit_code) {
            return Err(StepFailure::assertion(format!(
                "exit code {} not in permitted exit codes {:?}",
                exit_code, permitted
            )));
        }
    }

    if let (Some(permitted), Outcome::Response { status, .. }) =
        (action.permitted_status_codes(), outcome)
    {
        if !permitted.contains(status) {
            return Err(StepFailure::assertion(format!(
                "status code {} not in permitted status codes {:?}",
                status, permitted
            )));
        }
    }

    if let (Some(expected), Outcome::Process { stdout, stderr, .. }) =
        (action.expected_output(), outcome)
    {
        if !stdout.contains(expected) && !stderr.contains(expected) {
            return Err(StepFailure::assertion(format!(
                "output does not contain '{}'",
                expected
            )));
        }
    }

    if let Some(pattern) = action.expected_pattern() {
        match_partial(&pattern, view)
            .map_err(|mismatch| StepFailure::assertion(format!("outcome mismatch {}", mismatch)))?;
    }

    Ok(())
}
