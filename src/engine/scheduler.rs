//! Worker pool scheduler
//!
//! Flattens the suite tree into an ordered job list and runs it with a
//! bounded pool of workers pulling from a shared cursor. Each context runs in
//! its own task so a panic only fails that context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::common::Error;
use crate::suite::{Context, Spec};

use super::context::ContextRunner;
use super::report::ContextReport;

/// Position of a context in the suite tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub spec: usize,
    pub test: usize,
    pub context: usize,
}

/// One schedulable context
#[derive(Debug, Clone)]
pub struct Job {
    /// Index of the report slot this job fills
    pub slot: usize,
    pub location: Location,
    pub context: Arc<Context>,
}

/// Flatten specs into jobs, depth-first, slot numbers in tree order
pub fn flatten(specs: &[Spec]) -> Vec<Job> {
    let mut jobs = Vec::new();
    for (si, spec) in specs.iter().enumerate() {
        for (ti, test) in spec.tests.iter().enumerate() {
            for (ci, context) in test.contexts.iter().enumerate() {
                jobs.push(Job {
                    slot: jobs.len(),
                    location: Location {
                        spec: si,
                        test: ti,
                        context: ci,
                    },
                    context: Arc::new(context.clone()),
                });
            }
        }
    }
    jobs
}

/// Run every job with at most `workers` contexts in flight
///
/// Returns one `(slot, report)` pair per job, in completion order.
pub async fn run_pool(
    jobs: Vec<Job>,
    workers: usize,
    runner: Arc<ContextRunner>,
) -> Vec<(usize, ContextReport)> {
    let total = jobs.len();
    let workers = workers.max(1).min(total);
    if workers == 0 {
        return Vec::new();
    }

    tracing::info!(contexts = total, workers, "Starting worker pool");

    let jobs = Arc::new(jobs);
    let cursor = Arc::new(AtomicUsize::new(0));
    let mut pool = JoinSet::new();

    for worker in 0..workers {
        let jobs = jobs.clone();
        let cursor = cursor.clone();
        let runner = runner.clone();
        pool.spawn(async move {
            let mut done = Vec::new();
            loop {
                let next = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(job) = jobs.get(next) else {
                    break;
                };
                tracing::debug!(worker, slot = job.slot, "Worker picked up context");
                done.push((job.slot, run_job(job, runner.clone()).await));
            }
            done
        });
    }

    let mut reports = Vec::with_capacity(total);
    while let Some(joined) = pool.join_next().await {
        match joined {
            Ok(done) => reports.extend(done),
            // Contexts run in their own tasks, so a worker itself should not
            // fail; any slots it owned are filled in by the aggregator.
            Err(e) => tracing::error!("Worker task failed: {}", e),
        }
    }
    reports
}

/// Run one context in its own task, converting a panic into an error report
async fn run_job(job: &Job, runner: Arc<ContextRunner>) -> ContextReport {
    let context = job.context.clone();
    let span = tracing::info_span!("context", id = %context.id());

    let handle = tokio::spawn(
        async move { runner.run(&context).await }.instrument(span),
    );

    match handle.await {
        Ok(report) => report,
        Err(e) => {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            let error = Error::context_failed(job.context.id(), reason);
            tracing::warn!("{}", error);
            ContextReport::failed(&job.context, error.to_string())
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
