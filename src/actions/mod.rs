//! Built-in action executors
//!
//! Executors for process, HTTP and wait steps. Browser steps have no built-in
//! executor; embedders register one on the [`ExecutorRegistry`].

pub mod apps;
pub mod code;
pub mod http;
pub mod process;
pub mod shell;
pub mod wait;

use std::sync::Arc;

use crate::common::config::Config;
use crate::common::Result;
use crate::engine::{ExecutorRegistry, RunnerDetails};
use crate::suite::StepKind;

pub use apps::detect_available_apps;
pub use code::CodeExecutor;
pub use http::HttpExecutor;
pub use shell::ShellExecutor;
pub use wait::WaitExecutor;

/// Registry with every built-in executor
pub fn default_registry(config: &Config) -> Result<ExecutorRegistry> {
    Ok(ExecutorRegistry::new()
        .with(StepKind::RunShell, Arc::new(ShellExecutor))
        .with(StepKind::RunCode, Arc::new(CodeExecutor))
        .with(StepKind::HttpRequest, Arc::new(HttpExecutor::new(&config.http)?))
        .with(StepKind::Wait, Arc::new(WaitExecutor)))
}

/// Host capabilities and unsafe-step policy from the config file
pub fn runner_details(config: &Config) -> RunnerDetails {
    RunnerDetails::new(detect_available_apps(&config.apps.extra))
        .with_unsafe_steps(config.runner.allow_unsafe_steps)
}
