//! Action executor capability
//!
//! Executors perform the real effect of a step (spawn a process, send a
//! request, drive a browser). The engine only sees this narrow interface and
//! a registry mapping step kinds to executors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::suite::{StepAction, StepKind};

/// Raw result of one executor call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Process output and exit code
    Process {
        stdout: String,
        stderr: String,
        exit_code: i64,
    },
    /// Structured response
    Response {
        status: u16,
        headers: Map<String, Value>,
        body: Value,
    },
    /// Browser driver event
    Driver(Value),
}

impl Outcome {
    /// Structured view used by the matcher and by captures
    pub fn to_value(&self) -> Value {
        match self {
            Outcome::Process {
                stdout,
                stderr,
                exit_code,
            } => json!({
                "stdio": { "stdout": stdout, "stderr": stderr },
                "exitCode": exit_code,
            }),
            Outcome::Response {
                status,
                headers,
                body,
            } => json!({
                "response": { "status": status, "headers": headers, "body": body },
            }),
            Outcome::Driver(value) => value.clone(),
        }
    }
}

/// Failure raised by an executor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Mac,
    Windows,
}

impl Platform {
    /// Get the current platform
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::Mac;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Mac => write!(f, "mac"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

/// Execution environment description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub platform: Platform,
}

/// What the host can do, passed to every executor call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerDetails {
    pub environment: Environment,
    pub available_apps: Vec<String>,
    pub allow_unsafe_steps: bool,
}

impl RunnerDetails {
    pub fn new(available_apps: Vec<String>) -> Self {
        Self {
            environment: Environment {
                platform: Platform::current(),
            },
            available_apps,
            allow_unsafe_steps: false,
        }
    }

    pub fn with_unsafe_steps(mut self, allow: bool) -> Self {
        self.allow_unsafe_steps = allow;
        self
    }

    /// Whether `app` is available (case-insensitive)
    pub fn has_app(&self, app: &str) -> bool {
        self.available_apps
            .iter()
            .any(|a| a.eq_ignore_ascii_case(app))
    }
}

/// Trait for step executors
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Perform a resolved step action
    async fn execute(
        &self,
        action: &StepAction,
        details: &RunnerDetails,
    ) -> Result<Outcome, ExecutionFailure>;
}

/// Maps step kinds to executors
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<StepKind, Arc<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for a kind, replacing any previous one
    pub fn register(&mut self, kind: StepKind, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, kind: StepKind, executor: Arc<dyn ActionExecutor>) -> Self {
        self.register(kind, executor);
        self
    }

    pub fn get(&self, kind: StepKind) -> Option<&Arc<dyn ActionExecutor>> {
        self.executors.get(&kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<StepKind> {
        let mut kinds: Vec<StepKind> = self.executors.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
