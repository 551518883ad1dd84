//! Run reports and result aggregation
//!
//! Context reports are placed into pre-allocated slots, one per context, in
//! the same order the scheduler flattens the tree. Counters are computed by a
//! single fold over the finished tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{Error, Result};
use crate::suite::{Context, Spec, Step};

use super::failure::{CaptureFailure, StepFailure};

/// Result of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Error,
    Skipped,
}

impl StepStatus {
    /// Verdict contributed to the parent context; skipped steps contribute none
    pub fn verdict(self) -> Option<Verdict> {
        match self {
            StepStatus::Pass => Some(Verdict::Pass),
            StepStatus::Fail => Some(Verdict::Fail),
            StepStatus::Error => Some(Verdict::Error),
            StepStatus::Skipped => None,
        }
    }

    pub fn is_failing(self) -> bool {
        matches!(self, StepStatus::Fail | StepStatus::Error)
    }
}

/// Aggregate result, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

impl Verdict {
    /// Worst verdict of `verdicts`, `Pass` when empty
    pub fn worst<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Verdict {
        verdicts.into_iter().max().unwrap_or(Verdict::Pass)
    }
}

/// Report for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub description: String,
    pub result: StepStatus,
    pub duration_ms: u64,
    /// Values captured into the variable store by this step
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture_failures: Vec<CaptureFailure>,
    /// Structured view of the executor's outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

impl StepResult {
    /// A step that never ran
    pub fn skipped(step: &Step) -> Self {
        Self {
            step_id: step.id().to_string(),
            description: step.describe(),
            result: StepStatus::Skipped,
            duration_ms: 0,
            variables: Map::new(),
            failure: None,
            capture_failures: Vec::new(),
            outcome: None,
        }
    }
}

/// Report for one context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReport {
    pub context_id: String,
    pub result: Verdict,
    pub steps: Vec<StepResult>,
    /// Context-level fault or abort reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContextReport {
    /// Build a report; a context-level error forces an `error` verdict
    pub fn new(context_id: impl Into<String>, steps: Vec<StepResult>, error: Option<String>) -> Self {
        let result = if error.is_some() {
            Verdict::Error
        } else {
            Verdict::worst(steps.iter().filter_map(|s| s.result.verdict()))
        };
        Self {
            context_id: context_id.into(),
            result,
            steps,
            error,
        }
    }

    /// An infrastructure failure: every step is reported as skipped
    pub fn failed(context: &Context, message: impl Into<String>) -> Self {
        let steps = context.steps.iter().map(StepResult::skipped).collect();
        Self::new(context.id(), steps, Some(message.into()))
    }
}

/// Report for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub test_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub result: Verdict,
    pub contexts: Vec<ContextReport>,
}

/// Report for one spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecReport {
    pub spec_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub result: Verdict,
    pub tests: Vec<TestReport>,
}

/// pass/fail/error tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
}

impl Counts {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Error => self.error += 1,
        }
    }
}

/// Step tallies, including skipped steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub skipped: usize,
}

impl StepCounts {
    fn add(&mut self, status: StepStatus) {
        match status {
            StepStatus::Pass => self.pass += 1,
            StepStatus::Fail => self.fail += 1,
            StepStatus::Error => self.error += 1,
            StepStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Counters over the whole report tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub specs: Counts,
    pub tests: Counts,
    pub contexts: Counts,
    pub steps: StepCounts,
}

impl Summary {
    /// Fold the finished tree into counters
    pub fn fold(specs: &[SpecReport]) -> Self {
        specs.iter().fold(Summary::default(), |mut summary, spec| {
            summary.specs.add(spec.result);
            for test in &spec.tests {
                summary.tests.add(test.result);
                for context in &test.contexts {
                    summary.contexts.add(context.result);
                    for step in &context.steps {
                        summary.steps.add(step.result);
                    }
                }
            }
            summary
        })
    }

    /// Whether anything failed or errored
    pub fn has_failures(&self) -> bool {
        self.contexts.fail > 0
            || self.contexts.error > 0
            || self.steps.fail > 0
            || self.steps.error > 0
    }
}

/// Final output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: Summary,
    pub specs: Vec<SpecReport>,
}

impl RunReport {
    /// Find a context report by id
    pub fn context(&self, context_id: &str) -> Option<&ContextReport> {
        self.specs
            .iter()
            .flat_map(|s| &s.tests)
            .flat_map(|t| &t.contexts)
            .find(|c| c.context_id == context_id)
    }
}

struct TestShape {
    test_id: String,
    description: Option<String>,
    contexts: Vec<String>,
}

struct SpecShape {
    spec_id: String,
    description: Option<String>,
    tests: Vec<TestShape>,
}

/// Collects context reports into their tree slots
pub struct Aggregator {
    shape: Vec<SpecShape>,
    slots: Vec<Option<ContextReport>>,
}

impl Aggregator {
    /// Pre-allocate one slot per context, in depth-first order
    pub fn new(specs: &[Spec]) -> Self {
        let shape: Vec<SpecShape> = specs
            .iter()
            .map(|spec| SpecShape {
                spec_id: spec.spec_id.clone(),
                description: spec.description.clone(),
                tests: spec
                    .tests
                    .iter()
                    .map(|test| TestShape {
                        test_id: test.test_id.clone(),
                        description: test.description.clone(),
                        contexts: test.contexts.iter().map(|c| c.id().to_string()).collect(),
                    })
                    .collect(),
            })
            .collect();
        let total = shape
            .iter()
            .flat_map(|s| &s.tests)
            .map(|t| t.contexts.len())
            .sum();

        Self {
            shape,
            slots: vec![None; total],
        }
    }

    /// Number of context slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write a context report into its slot; each slot is written once
    pub fn place(&mut self, slot: usize, report: ContextReport) -> Result<()> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| Error::Internal(format!("no report slot {}", slot)))?;
        if entry.is_some() {
            return Err(Error::Internal(format!(
                "report slot {} ('{}') written twice",
                slot, report.context_id
            )));
        }
        *entry = Some(report);
        Ok(())
    }

    /// Assemble the report tree and fold the summary
    ///
    /// A slot that never received a report is recorded as an `error` context.
    pub fn finish(self) -> RunReport {
        let mut slots = self.slots.into_iter();
        let specs: Vec<SpecReport> = self
            .shape
            .into_iter()
            .map(|spec| {
                let tests: Vec<TestReport> = spec
                    .tests
                    .into_iter()
                    .map(|test| {
                        let contexts: Vec<ContextReport> = test
                            .contexts
                            .into_iter()
                            .map(|context_id| {
                                slots.next().flatten().unwrap_or_else(|| {
                                    ContextReport::new(
                                        context_id,
                                        Vec::new(),
                                        Some("context produced no report".to_string()),
                                    )
                                })
                            })
                            .collect();
                        TestReport {
                            test_id: test.test_id,
                            description: test.description,
                            result: Verdict::worst(contexts.iter().map(|c| c.result)),
                            contexts,
                        }
                    })
                    .collect();
                SpecReport {
                    spec_id: spec.spec_id,
                    description: spec.description,
                    result: Verdict::worst(tests.iter().map(|t| t.result)),
                    tests,
                }
            })
            .collect();

        RunReport {
            summary: Summary::fold(&specs),
            specs,
        }
    }
}
