//! `wait` executor

use std::time::Duration;

use serde_json::json;

use crate::engine::{ActionExecutor, ExecutionFailure, Outcome, RunnerDetails};
use crate::suite::StepAction;

/// Sleeps for the step's duration
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitExecutor;

#[async_trait::async_trait]
impl ActionExecutor for WaitExecutor {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure> {
        let StepAction::Wait(wait) = action else {
            return Err(ExecutionFailure::new(format!(
                "wait executor cannot run {}",
                action.kind()
            )));
        };
        tokio::time::sleep(Duration::from_millis(wait.duration)).await;
        Ok(Outcome::Driver(json!({ "waited": wait.duration })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_waits_at_least_duration() {
        let step: crate::suite::Step =
            serde_json::from_value(json!({ "wait": { "duration": 20 } })).unwrap();
        let start = Instant::now();
        let outcome = WaitExecutor
            .execute(&step.action, &RunnerDetails::new(Vec::new()))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(outcome.to_value()["waited"], 20);
    }
}
