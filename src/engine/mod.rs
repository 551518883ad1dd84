//! Execution engine
//!
//! Runs a prepared suite tree: scheduler, context and step runners, the
//! debug controller, variable resolution and outcome matching.

pub mod context;
pub mod debug;
pub mod executor;
pub mod failure;
pub mod matcher;
pub mod path;
pub mod report;
pub mod scheduler;
pub mod step;
pub mod variables;

use std::sync::Arc;
use std::time::Duration;

use crate::common::Result;
use crate::suite::{prepare, RunInput};

pub use context::ContextRunner;
pub use debug::{DebugController, DebugDecision, DebugPrompt, NonInteractive, Pause, TerminalPrompt};
pub use executor::{ActionExecutor, ExecutionFailure, ExecutorRegistry, Outcome, Platform, RunnerDetails};
pub use failure::{CaptureFailure, FailureKind, StepFailure};
pub use report::{
    Aggregator, ContextReport, Counts, RunReport, SpecReport, StepCounts, StepResult, StepStatus,
    Summary, TestReport, Verdict,
};
pub use step::StepRunner;
pub use variables::VariableStore;

/// Entry point for running suites
pub struct Engine {
    registry: Arc<ExecutorRegistry>,
    details: RunnerDetails,
    prompt: Arc<dyn DebugPrompt>,
    default_step_timeout: Option<Duration>,
}

impl Engine {
    /// Engine with the given executors, no available apps and a
    /// non-interactive prompt
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            details: RunnerDetails::new(Vec::new()),
            prompt: Arc::new(NonInteractive),
            default_step_timeout: None,
        }
    }

    pub fn with_details(mut self, details: RunnerDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn DebugPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_default_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn details(&self) -> &RunnerDetails {
        &self.details
    }

    /// Run a suite to completion
    ///
    /// Fails only for malformed input; step and context failures are
    /// reported in the returned tree.
    pub async fn run(&self, input: RunInput) -> Result<RunReport> {
        let input = prepare(input)?;
        let config = &input.config;

        // Settings in the input tree override the engine defaults
        let allow_unsafe = config
            .allow_unsafe_steps
            .unwrap_or(self.details.allow_unsafe_steps);
        let details = self.details.clone().with_unsafe_steps(allow_unsafe);
        let timeout = config
            .default_step_timeout
            .map(Duration::from_millis)
            .or(self.default_step_timeout);

        let runner = Arc::new(ContextRunner::new(
            StepRunner::new(self.registry.clone(), details, timeout),
            config.debug_options(),
            self.prompt.clone(),
        ));

        let mut aggregator = Aggregator::new(&input.specs);
        let jobs = scheduler::flatten(&input.specs);
        tracing::info!(
            specs = input.specs.len(),
            contexts = aggregator.len(),
            concurrent_runners = config.concurrent_runners(),
            "Run started"
        );

        for (slot, report) in scheduler::run_pool(jobs, config.concurrent_runners(), runner).await {
            aggregator.place(slot, report)?;
        }

        let report = aggregator.finish();
        tracing::info!(
            passed = report.summary.contexts.pass,
            failed = report.summary.contexts.fail,
            errored = report.summary.contexts.error,
            "Run finished"
        );
        Ok(report)
    }
}
