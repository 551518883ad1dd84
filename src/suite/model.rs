//! Suite definition types
//!
//! Defines the data structures for deserializing a suite tree
//! (Spec → Test → Context → Step) from JSON or YAML.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete run request: config plus the spec tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    /// Run-level configuration
    #[serde(default)]
    pub config: RunConfig,
    /// Specs to execute, in order
    pub specs: Vec<Spec>,
}

/// Run-level configuration carried in the input tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Verbosity of engine logging
    #[serde(default)]
    pub log_level: LogLevel,
    /// Maximum number of contexts executing at once (default 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_runners: Option<usize>,
    /// Debug behaviour: `"stepThrough"` or a structured block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugSetting>,
    /// Whether steps flagged `unsafe` may run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_unsafe_steps: Option<bool>,
    /// Timeout in milliseconds for steps without their own `timeout`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_step_timeout: Option<u64>,
}

impl RunConfig {
    /// Effective worker count
    pub fn concurrent_runners(&self) -> usize {
        self.concurrent_runners.unwrap_or(1)
    }

    /// Effective debug options
    pub fn debug_options(&self) -> DebugOptions {
        self.debug
            .as_ref()
            .map(DebugSetting::options)
            .unwrap_or_default()
    }
}

/// Log verbosity requested by a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// `EnvFilter` directive for this level
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "e2e_runner=error,error",
            LogLevel::Warning => "e2e_runner=warn,warn",
            LogLevel::Info => "e2e_runner=info,warn",
            LogLevel::Debug => "e2e_runner=debug,info",
        }
    }
}

/// Debug configuration as written in the input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DebugSetting {
    /// Shorthand literal, e.g. `debug: stepThrough`
    Mode(DebugMode),
    /// Structured block
    Options(DebugOptions),
}

/// Shorthand debug modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugMode {
    #[serde(rename = "stepThrough")]
    StepThrough,
}

impl DebugSetting {
    /// Normalize to structured options
    pub fn options(&self) -> DebugOptions {
        match self {
            DebugSetting::Mode(DebugMode::StepThrough) => DebugOptions {
                step_through: true,
                ..DebugOptions::default()
            },
            DebugSetting::Options(options) => options.clone(),
        }
    }
}

/// Structured debug options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugOptions {
    /// Pause before and after every step
    #[serde(default)]
    pub step_through: bool,
    /// Pause after a step that fails or errors
    #[serde(default)]
    pub break_on_fail: bool,
    /// Step ids that always pause before running
    #[serde(default)]
    pub breakpoints: Vec<String>,
}

impl DebugOptions {
    /// Whether any pausing is configured at all
    pub fn is_enabled(&self) -> bool {
        self.step_through || self.break_on_fail || !self.breakpoints.is_empty()
    }
}

/// A spec: the root grouping of tests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub spec_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tests: Vec<Test>,
}

/// A test: an ordered set of independent contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub test_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub contexts: Vec<Context>,
}

/// One independent execution path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Assigned as `<testId>-context-<n>` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Initial values for this context's variable store
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
    pub steps: Vec<Step>,
}

impl Context {
    /// Context id, or an empty string before ids are assigned
    pub fn id(&self) -> &str {
        self.context_id.as_deref().unwrap_or_default()
    }
}

/// A single step: common fields plus exactly one action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Assigned as `<contextId>-step-<n>` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capture map: variable name → `$$path` or interpolated expression,
    /// evaluated in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
    /// Timeout in milliseconds for the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Step performs an unsafe effect and needs `allowUnsafeSteps`
    #[serde(default, rename = "unsafe")]
    pub is_unsafe: bool,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    /// Step id, or an empty string before ids are assigned
    pub fn id(&self) -> &str {
        self.step_id.as_deref().unwrap_or_default()
    }

    /// Human readable description, derived from the action when absent
    pub fn describe(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.action.summary())
    }
}

/// The kind of a step, used to select its executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    RunShell,
    RunCode,
    HttpRequest,
    GoTo,
    Find,
    Click,
    TypeKeys,
    Wait,
}

impl StepKind {
    /// Name of the action key in suite files
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::RunShell => "runShell",
            StepKind::RunCode => "runCode",
            StepKind::HttpRequest => "httpRequest",
            StepKind::GoTo => "goTo",
            StepKind::Find => "find",
            StepKind::Click => "click",
            StepKind::TypeKeys => "typeKeys",
            StepKind::Wait => "wait",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step action, keyed by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    RunShell(RunShell),
    RunCode(RunCode),
    HttpRequest(HttpRequest),
    GoTo(GoTo),
    Find(Find),
    Click(Click),
    TypeKeys(TypeKeys),
    Wait(Wait),
}

/// Capability name for browser-driving steps
pub const BROWSER_APP: &str = "browser";
/// Capability name for shell steps
pub const SHELL_APP: &str = "shell";
/// Capability name for HTTP steps
pub const HTTP_APP: &str = "http";

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            StepAction::RunShell(_) => StepKind::RunShell,
            StepAction::RunCode(_) => StepKind::RunCode,
            StepAction::HttpRequest(_) => StepKind::HttpRequest,
            StepAction::GoTo(_) => StepKind::GoTo,
            StepAction::Find(_) => StepKind::Find,
            StepAction::Click(_) => StepKind::Click,
            StepAction::TypeKeys(_) => StepKind::TypeKeys,
            StepAction::Wait(_) => StepKind::Wait,
        }
    }

    /// Capability that must be listed in `availableApps` for this step to run
    pub fn required_app(&self) -> Option<String> {
        match self {
            StepAction::RunShell(_) => Some(SHELL_APP.to_string()),
            StepAction::RunCode(code) => Some(
                interpreter_app(&code.language)
                    .map(str::to_string)
                    .unwrap_or_else(|| code.language.to_lowercase()),
            ),
            StepAction::HttpRequest(_) => Some(HTTP_APP.to_string()),
            StepAction::GoTo(_)
            | StepAction::Find(_)
            | StepAction::Click(_)
            | StepAction::TypeKeys(_) => Some(BROWSER_APP.to_string()),
            StepAction::Wait(_) => None,
        }
    }

    /// Exit codes that count as success for process steps
    pub fn permitted_exit_codes(&self) -> Option<&[i64]> {
        match self {
            StepAction::RunShell(shell) => Some(&shell.exit_codes),
            StepAction::RunCode(code) => Some(&code.exit_codes),
            _ => None,
        }
    }

    /// Status codes that count as success for HTTP steps
    pub fn permitted_status_codes(&self) -> Option<&[u16]> {
        match self {
            StepAction::HttpRequest(http) => Some(&http.status_codes),
            _ => None,
        }
    }

    /// Substring expected somewhere in a process step's output
    pub fn expected_output(&self) -> Option<&str> {
        match self {
            StepAction::RunShell(shell) => shell.stdio.as_deref(),
            StepAction::RunCode(code) => code.stdio.as_deref(),
            _ => None,
        }
    }

    /// Partial pattern the outcome's structured view must match
    pub fn expected_pattern(&self) -> Option<Value> {
        match self {
            StepAction::HttpRequest(http) => {
                let mut response = Map::new();
                if !http.response_headers.is_empty() {
                    let headers = http
                        .response_headers
                        .iter()
                        .map(|(k, v)| (k.to_lowercase(), v.clone()))
                        .collect::<Map<String, Value>>();
                    response.insert("headers".to_string(), Value::Object(headers));
                }
                if let Some(body) = &http.response_data {
                    response.insert("body".to_string(), body.clone());
                }
                if response.is_empty() {
                    None
                } else {
                    Some(serde_json::json!({ "response": response }))
                }
            }
            StepAction::Find(find) => find
                .match_text
                .as_ref()
                .map(|text| serde_json::json!({ "element": { "text": text } })),
            _ => None,
        }
    }

    /// One-line summary used when a step has no description
    pub fn summary(&self) -> String {
        match self {
            StepAction::RunShell(shell) => {
                if shell.args.is_empty() {
                    format!("runShell: {}", shell.command)
                } else {
                    format!("runShell: {} {}", shell.command, shell.args.join(" "))
                }
            }
            StepAction::RunCode(code) => format!("runCode: {}", code.language),
            StepAction::HttpRequest(http) => {
                format!("httpRequest: {} {}", http.method.to_uppercase(), http.url)
            }
            StepAction::GoTo(go) => format!("goTo: {}", go.url),
            StepAction::Find(find) => format!("find: {}", find.selector),
            StepAction::Click(click) => format!("click: {}", click.selector),
            StepAction::TypeKeys(keys) => format!("typeKeys: {}", keys.keys.join("")),
            StepAction::Wait(wait) => format!("wait: {}ms", wait.duration),
        }
    }
}

/// Map a `runCode` language to the capability that runs it
pub fn interpreter_app(language: &str) -> Option<&'static str> {
    match language.to_lowercase().as_str() {
        "python" | "python3" | "py" => Some("python"),
        "javascript" | "js" | "node" => Some("node"),
        "bash" => Some("bash"),
        "sh" | "shell" => Some(SHELL_APP),
        _ => None,
    }
}

fn default_exit_codes() -> Vec<i64> {
    vec![0]
}

fn default_status_codes() -> Vec<u16> {
    vec![200, 201]
}

fn default_method() -> String {
    "get".to_string()
}

fn default_wait() -> u64 {
    5000
}

/// Run a shell command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunShell {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_exit_codes")]
    pub exit_codes: Vec<i64>,
    /// Substring expected in stdout or stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// Run code through a language interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCode {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_exit_codes")]
    pub exit_codes: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// Issue an HTTP request and assert on the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
    #[serde(default = "default_status_codes")]
    pub status_codes: Vec<u16>,
    /// Partial pattern over response headers (names compared lowercase)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub response_headers: Map<String, Value>,
    /// Partial pattern over the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

/// Navigate the browser to a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoTo {
    pub url: String,
}

/// Locate an element, optionally checking its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Find {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_text: Option<String>,
}

/// Click an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Click {
    pub selector: String,
}

/// Send key strokes, optionally to a specific element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeKeys {
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Pause for a fixed duration in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wait {
    #[serde(default = "default_wait")]
    pub duration: u64,
}
