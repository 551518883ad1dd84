//! Step failure taxonomy
//!
//! Step-level failures are values recorded into a `StepResult`, never
//! errors that propagate out of a context.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::report::StepStatus;

/// Why a step did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Outcome did not match the expected pattern, exit code or status
    AssertionMismatch,
    /// The executor raised a failure
    ExecutionFailure,
    /// The executor did not complete within the step timeout
    TimeoutExceeded,
    /// A `$NAME` reference had no value
    UnresolvedVariable,
    /// No executor or required app for the step
    UnsupportedCapability,
    /// Step is flagged unsafe and unsafe steps are disallowed
    UnsafeStepRejected,
}

impl FailureKind {
    /// Step status implied by this failure
    pub fn status(self) -> StepStatus {
        match self {
            FailureKind::AssertionMismatch
            | FailureKind::TimeoutExceeded
            | FailureKind::UnresolvedVariable => StepStatus::Fail,
            FailureKind::ExecutionFailure
            | FailureKind::UnsupportedCapability
            | FailureKind::UnsafeStepRejected => StepStatus::Error,
        }
    }

    /// Fatal failures stop the rest of the context
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            FailureKind::UnsupportedCapability | FailureKind::UnsafeStepRejected
        )
    }
}

/// A recorded step failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AssertionMismatch, message)
    }

    pub fn unresolved(name: &str) -> Self {
        Self::new(
            FailureKind::UnresolvedVariable,
            format!("unresolved variable '${}'", name),
        )
    }

    pub fn timeout(millis: u128) -> Self {
        Self::new(
            FailureKind::TimeoutExceeded,
            format!("step timed out after {}ms", millis),
        )
    }

    pub fn status(&self) -> StepStatus {
        self.kind.status()
    }
}

/// A capture that could not be resolved; recorded only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFailure {
    pub variable: String,
    pub expression: String,
    pub reason: String,
}
