//! Engine integration tests
//!
//! Runs whole suites through the public API with scripted executors, plus a
//! few scenarios against the real shell executor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use e2e_runner::engine::{
    ActionExecutor, DebugDecision, DebugPrompt, Engine, ExecutionFailure, ExecutorRegistry,
    FailureKind, NonInteractive, Outcome, Pause, RunReport, RunnerDetails, StepStatus, Summary,
    Verdict,
};
use e2e_runner::suite::{parse_str, Format, RunInput, StepAction, StepKind};

/// Scripted process executor
///
/// `echo X` prints X, `exit N` exits with N, `sleep N` sleeps N ms,
/// `panic` panics. Tracks how many calls are in flight at once.
#[derive(Default)]
struct ScriptedShell {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ActionExecutor for ScriptedShell {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure> {
        let StepAction::RunShell(shell) = action else {
            return Err(ExecutionFailure::new("not a shell step"));
        };
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let command = shell.command.trim();
        let mut stdout = String::new();
        let mut exit_code = 0;
        if let Some(text) = command.strip_prefix("echo ") {
            stdout = format!("{}\n", text);
        } else if let Some(code) = command.strip_prefix("exit ") {
            exit_code = code.parse().unwrap();
        } else if let Some(ms) = command.strip_prefix("sleep ") {
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap())).await;
        } else if command == "panic" {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("scripted panic");
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Outcome::Process {
            stdout,
            stderr: String::new(),
            exit_code,
        })
    }
}

/// HTTP executor answering from a URL → body table and recording requests
#[derive(Default)]
struct ScriptedHttp {
    bodies: HashMap<String, Value>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    fn with(mut self, url: &str, body: Value) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }
}

#[async_trait::async_trait]
impl ActionExecutor for ScriptedHttp {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure> {
        let StepAction::HttpRequest(request) = action else {
            return Err(ExecutionFailure::new("not an http step"));
        };
        self.seen.lock().unwrap().push(request.url.clone());
        match self.bodies.get(&request.url) {
            Some(body) => Ok(Outcome::Response {
                status: 200,
                headers: serde_json::Map::new(),
                body: body.clone(),
            }),
            None => Ok(Outcome::Response {
                status: 404,
                headers: serde_json::Map::new(),
                body: Value::Null,
            }),
        }
    }
}

/// Prompt that always answers the same and counts pauses
struct Always {
    decision: DebugDecision,
    pauses: AtomicUsize,
}

impl Always {
    fn new(decision: DebugDecision) -> Arc<Self> {
        Arc::new(Self {
            decision,
            pauses: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl DebugPrompt for Always {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn decide(&self, _pause: &Pause) -> DebugDecision {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.decision
    }
}

fn apps() -> RunnerDetails {
    RunnerDetails::new(vec!["shell".to_string(), "http".to_string()])
}

fn engine_with(shell: Arc<ScriptedShell>) -> Engine {
    Engine::new(ExecutorRegistry::new().with(StepKind::RunShell, shell)).with_details(apps())
}

fn input(value: Value) -> RunInput {
    serde_json::from_value(value).unwrap()
}

/// One spec, one test, the given contexts
fn suite(config: Value, contexts: Value) -> RunInput {
    input(json!({
        "config": config,
        "specs": [{
            "specId": "spec",
            "tests": [{ "testId": "test", "contexts": contexts }]
        }]
    }))
}

/// Several contexts with a mix of outcomes
fn mixed_contexts() -> Value {
    json!([
        { "steps": [{ "runShell": { "command": "echo a" } }, { "runShell": { "command": "exit 2" } }] },
        { "steps": [{ "runShell": { "command": "sleep 20" } }] },
        { "steps": [{ "runShell": { "command": "echo b" } }, { "click": { "selector": "#x" } }, { "runShell": { "command": "echo c" } }] },
        { "steps": [{ "runShell": { "command": "exit 0" } }] },
        { "steps": [] }
    ])
}

async fn run_summary(config: Value) -> Summary {
    engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(config, mixed_contexts()))
        .await
        .unwrap()
        .summary
}

#[tokio::test]
async fn test_omitted_concurrency_matches_one_runner() {
    let omitted = run_summary(json!({})).await;
    let one = run_summary(json!({ "concurrentRunners": 1 })).await;
    assert_eq!(omitted, one);
}

#[tokio::test]
async fn test_summary_independent_of_concurrency() {
    let baseline = run_summary(json!({ "concurrentRunners": 1 })).await;
    for runners in [2, 4, 5, 16] {
        let summary = run_summary(json!({ "concurrentRunners": runners })).await;
        assert_eq!(summary, baseline, "concurrentRunners = {}", runners);
    }
    assert_eq!(baseline.contexts.pass, 3);
    assert_eq!(baseline.contexts.fail, 1);
    assert_eq!(baseline.contexts.error, 1);
    assert_eq!(baseline.steps.skipped, 1);
}

#[tokio::test]
async fn test_report_order_matches_tree_order() {
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(json!({ "concurrentRunners": 4 }), mixed_contexts()))
        .await
        .unwrap();
    let ids: Vec<&str> = report.specs[0].tests[0]
        .contexts
        .iter()
        .map(|c| c.context_id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "test-context-1",
            "test-context-2",
            "test-context-3",
            "test-context-4",
            "test-context-5"
        ]
    );
}

#[tokio::test]
async fn test_failing_step_does_not_stop_context() {
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(
            json!({}),
            json!([{ "steps": [
                { "runShell": { "command": "echo success" } },
                { "runShell": { "command": "exit 1" } }
            ]}]),
        ))
        .await
        .unwrap();

    assert_eq!(report.summary.steps.pass, 1);
    assert_eq!(report.summary.steps.fail, 1);
    assert_eq!(report.summary.contexts.fail, 1);
    assert_eq!(report.specs[0].result, Verdict::Fail);
}

#[tokio::test]
async fn test_capture_then_substitute() {
    let http = Arc::new(
        ScriptedHttp::default()
            .with("https://api.test/users", json!({ "data": [{ "id": 7 }] }))
            .with("https://api.test/users/7", json!({ "id": 7, "first_name": "George" })),
    );
    let engine = Engine::new(ExecutorRegistry::new().with(StepKind::HttpRequest, http.clone()))
        .with_details(apps());

    let report = engine
        .run(suite(
            json!({}),
            json!([{ "steps": [
                {
                    "httpRequest": { "url": "https://api.test/users" },
                    "variables": { "ID": "$$response.body.data[0].id" }
                },
                { "httpRequest": { "url": "https://api.test/users/$ID" } }
            ]}]),
        ))
        .await
        .unwrap();

    let context = report.context("test-context-1").unwrap();
    assert_eq!(context.steps[0].variables["ID"], json!(7));
    assert_eq!(context.result, Verdict::Pass);
    assert_eq!(
        *http.seen.lock().unwrap(),
        vec!["https://api.test/users", "https://api.test/users/7"]
    );
}

#[tokio::test]
async fn test_partial_body_match_ignores_extra_fields() {
    let http = Arc::new(ScriptedHttp::default().with(
        "https://api.test/users",
        json!({ "page": 1, "data": [{ "id": 7, "first_name": "George", "last_name": "Bluth" }] }),
    ));
    let engine =
        Engine::new(ExecutorRegistry::new().with(StepKind::HttpRequest, http)).with_details(apps());

    let report = engine
        .run(suite(
            json!({}),
            json!([{ "steps": [
                { "httpRequest": {
                    "url": "https://api.test/users",
                    "responseData": { "data": [{ "first_name": "George" }] }
                } },
                { "httpRequest": {
                    "url": "https://api.test/users",
                    "responseData": { "data": [{ "first_name": "Lucille" }] }
                } }
            ]}]),
        ))
        .await
        .unwrap();

    let steps = &report.context("test-context-1").unwrap().steps;
    assert_eq!(steps[0].result, StepStatus::Pass);
    assert_eq!(steps[1].result, StepStatus::Fail);
    let failure = steps[1].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::AssertionMismatch);
    assert!(failure.message.contains("first_name"));
}

#[tokio::test]
async fn test_contexts_do_not_share_variables() {
    let shell = Arc::new(ScriptedShell::default());
    let report = engine_with(shell)
        .run(suite(
            json!({ "concurrentRunners": 2 }),
            json!([
                {
                    "variables": { "NAME": "first" },
                    "steps": [{
                        "runShell": { "command": "echo $NAME" },
                        "variables": { "OUT": "$$stdio.stdout", "ONLY_HERE": "x" }
                    }]
                },
                {
                    "steps": [{ "runShell": { "command": "echo ${ONLY_HERE}" } }]
                }
            ]),
        ))
        .await
        .unwrap();

    let first = report.context("test-context-1").unwrap();
    assert_eq!(first.steps[0].variables["OUT"], json!("first\n"));

    let second = report.context("test-context-2").unwrap();
    assert_eq!(second.steps[0].result, StepStatus::Fail);
    assert_eq!(
        second.steps[0].failure.as_ref().unwrap().kind,
        FailureKind::UnresolvedVariable
    );
}

#[tokio::test]
async fn test_step_through_without_terminal_completes() {
    let shell = Arc::new(ScriptedShell::default());
    let report = engine_with(shell.clone())
        .with_prompt(Arc::new(NonInteractive))
        .run(suite(
            json!({ "debug": "stepThrough" }),
            json!([{ "steps": [
                { "runShell": { "command": "echo 1" } },
                { "runShell": { "command": "echo 2" } },
                { "runShell": { "command": "echo 3" } }
            ]}]),
        ))
        .await
        .unwrap();

    assert_eq!(report.summary.steps.pass, 3);
    assert_eq!(shell.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_breakpoint_skip_and_abort() {
    let contexts = json!([{ "steps": [
        { "stepId": "one", "runShell": { "command": "echo 1" } },
        { "stepId": "two", "runShell": { "command": "echo 2" } },
        { "stepId": "three", "runShell": { "command": "echo 3" } }
    ]}]);
    let config = json!({ "debug": { "breakpoints": ["two"] } });

    let prompt = Always::new(DebugDecision::Skip);
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .with_prompt(prompt.clone())
        .run(suite(config.clone(), contexts.clone()))
        .await
        .unwrap();
    let results: Vec<StepStatus> = report.context("test-context-1").unwrap().steps.iter().map(|s| s.result).collect();
    assert_eq!(results, vec![StepStatus::Pass, StepStatus::Skipped, StepStatus::Pass]);
    assert_eq!(prompt.pauses.load(Ordering::SeqCst), 1);

    let prompt = Always::new(DebugDecision::Abort);
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .with_prompt(prompt)
        .run(suite(config, contexts))
        .await
        .unwrap();
    let context = report.context("test-context-1").unwrap();
    let results: Vec<StepStatus> = context.steps.iter().map(|s| s.result).collect();
    assert_eq!(results, vec![StepStatus::Pass, StepStatus::Skipped, StepStatus::Skipped]);
    assert_eq!(context.result, Verdict::Error);
    assert!(context.error.as_ref().unwrap().contains("aborted"));
}

#[tokio::test]
async fn test_breakpoint_on_unresolved_step_pauses() {
    let contexts = json!([{ "steps": [
        { "stepId": "one", "runShell": { "command": "echo $E2E_RUNNER_UNSET_VARIABLE" } },
        { "stepId": "two", "runShell": { "command": "echo 2" } }
    ]}]);
    let config = json!({ "debug": { "breakpoints": ["one"] } });

    let prompt = Always::new(DebugDecision::Continue);
    let shell = Arc::new(ScriptedShell::default());
    let report = engine_with(shell.clone())
        .with_prompt(prompt.clone())
        .run(suite(config.clone(), contexts.clone()))
        .await
        .unwrap();
    let context = report.context("test-context-1").unwrap();
    assert_eq!(prompt.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(context.steps[0].result, StepStatus::Fail);
    assert_eq!(
        context.steps[0].failure.as_ref().unwrap().kind,
        FailureKind::UnresolvedVariable
    );
    assert_eq!(context.steps[1].result, StepStatus::Pass);
    assert_eq!(shell.calls.load(Ordering::SeqCst), 1);

    let prompt = Always::new(DebugDecision::Skip);
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .with_prompt(prompt.clone())
        .run(suite(config, contexts))
        .await
        .unwrap();
    let context = report.context("test-context-1").unwrap();
    assert_eq!(prompt.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(context.steps[0].result, StepStatus::Skipped);
    assert!(context.steps[0].failure.is_none());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let shell = Arc::new(ScriptedShell::default());
    let contexts: Vec<Value> = (0..8)
        .map(|_| json!({ "steps": [{ "runShell": { "command": "sleep 30" } }] }))
        .collect();

    let report = engine_with(shell.clone())
        .run(suite(json!({ "concurrentRunners": 3 }), Value::Array(contexts)))
        .await
        .unwrap();

    assert_eq!(report.summary.contexts.pass, 8);
    let max = shell.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "max in flight was {}", max);
    assert!(max >= 2, "expected parallel execution, max in flight was {}", max);
}

#[tokio::test]
async fn test_panic_fails_only_its_context() {
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(
            json!({ "concurrentRunners": 2 }),
            json!([
                { "steps": [{ "runShell": { "command": "panic" } }, { "runShell": { "command": "echo never" } }] },
                { "steps": [{ "runShell": { "command": "echo fine" } }] }
            ]),
        ))
        .await
        .unwrap();

    let broken = report.context("test-context-1").unwrap();
    assert_eq!(broken.result, Verdict::Error);
    assert!(broken.error.as_ref().unwrap().contains("scripted panic"));
    assert!(broken.steps.iter().all(|s| s.result == StepStatus::Skipped));

    assert_eq!(report.context("test-context-2").unwrap().result, Verdict::Pass);
    assert_eq!(report.summary.contexts.error, 1);
    assert_eq!(report.summary.contexts.pass, 1);
}

#[tokio::test]
async fn test_unsafe_steps_follow_config() {
    let contexts = json!([{ "steps": [{ "unsafe": true, "runShell": { "command": "echo risky" } }] }]);

    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(json!({}), contexts.clone()))
        .await
        .unwrap();
    let step = &report.context("test-context-1").unwrap().steps[0];
    assert_eq!(step.result, StepStatus::Error);
    assert_eq!(step.failure.as_ref().unwrap().kind, FailureKind::UnsafeStepRejected);

    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(json!({ "allowUnsafeSteps": true }), contexts))
        .await
        .unwrap();
    assert_eq!(report.summary.steps.pass, 1);
}

#[tokio::test]
async fn test_default_step_timeout_from_input() {
    let report = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(
            json!({ "defaultStepTimeout": 20 }),
            json!([{ "steps": [
                { "runShell": { "command": "sleep 5000" } },
                { "timeout": 10000, "runShell": { "command": "sleep 30" } }
            ]}]),
        ))
        .await
        .unwrap();

    let steps = &report.context("test-context-1").unwrap().steps;
    assert_eq!(
        steps[0].failure.as_ref().unwrap().kind,
        FailureKind::TimeoutExceeded
    );
    assert_eq!(steps[1].result, StepStatus::Pass);
}

#[tokio::test]
async fn test_malformed_input_is_rejected() {
    let engine = engine_with(Arc::new(ScriptedShell::default()));
    let err = engine
        .run(suite(json!({ "concurrentRunners": 0 }), json!([])))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("concurrentRunners"));

    let err = parse_str("specs:\n  - specId: s\n    tests:\n      - testId: t\n        contexts:\n          - steps:\n              - teleport: {}\n", Format::Yaml)
        .unwrap_err();
    assert!(matches!(err, e2e_runner::Error::MalformedInput(_)));
}

#[tokio::test]
async fn test_report_json_shape() {
    let report: RunReport = engine_with(Arc::new(ScriptedShell::default()))
        .run(suite(
            json!({}),
            json!([{ "steps": [{ "runShell": { "command": "echo hi" } }] }]),
        ))
        .await
        .unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["summary"]["contexts"]["pass"], 1);
    assert_eq!(value["summary"]["steps"]["skipped"], 0);
    assert_eq!(value["specs"][0]["specId"], "spec");
    assert_eq!(value["specs"][0]["tests"][0]["contexts"][0]["result"], "pass");
    assert_eq!(
        value["specs"][0]["tests"][0]["contexts"][0]["steps"][0]["stepId"],
        "test-context-1-step-1"
    );
}

#[cfg(unix)]
mod shell {
    use super::*;
    use e2e_runner::actions::{ShellExecutor, WaitExecutor};

    fn real_engine() -> Engine {
        Engine::new(
            ExecutorRegistry::new()
                .with(StepKind::RunShell, Arc::new(ShellExecutor))
                .with(StepKind::Wait, Arc::new(WaitExecutor)),
        )
        .with_details(apps())
    }

    #[tokio::test]
    async fn test_two_shell_contexts_in_parallel() {
        let report = real_engine()
            .run(suite(
                json!({ "concurrentRunners": 2 }),
                json!([
                    { "steps": [{ "runShell": { "command": "echo success", "stdio": "success" } }] },
                    { "steps": [{ "runShell": { "command": "echo success", "stdio": "success" } }] }
                ]),
            ))
            .await
            .unwrap();

        assert_eq!(report.summary.contexts.pass, 2);
        assert_eq!(report.summary.steps.pass, 2);
    }

    #[tokio::test]
    async fn test_echo_then_exit_one() {
        let report = real_engine()
            .run(suite(
                json!({}),
                json!([{ "steps": [
                    { "runShell": { "command": "echo success" } },
                    { "runShell": { "command": "exit 1" } }
                ]}]),
            ))
            .await
            .unwrap();

        assert_eq!(report.summary.steps.pass, 1);
        assert_eq!(report.summary.steps.fail, 1);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let report = real_engine()
            .run(suite(
                json!({}),
                json!([{ "steps": [
                    { "timeout": 100, "runShell": { "command": "sleep 30" } },
                    { "runShell": { "command": "echo next" } }
                ]}]),
            ))
            .await
            .unwrap();

        let steps = &report.context("test-context-1").unwrap().steps;
        assert_eq!(steps[0].result, StepStatus::Fail);
        assert!(steps[0].duration_ms < 10_000);
        assert_eq!(steps[1].result, StepStatus::Pass);
    }

    #[tokio::test]
    async fn test_yaml_suite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(
            &path,
            r#"
config:
  concurrentRunners: 2
specs:
  - specId: files
    tests:
      - testId: greet
        contexts:
          - variables:
              WHO: world
            steps:
              - runShell:
                  command: echo hello $WHO
                  stdio: hello world
                variables:
                  GREETING: $$stdio.stdout
              - runShell:
                  command: printf '%s' "$GREETING"
                  stdio: hello world
"#,
        )
        .unwrap();

        let input = e2e_runner::load_file(&path).unwrap();
        let report = real_engine().run(input).await.unwrap();
        let context = report.context("greet-context-1").unwrap();
        assert_eq!(context.result, Verdict::Pass, "{:?}", context);
    }
}
