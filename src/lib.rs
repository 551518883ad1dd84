//! e2e-runner - hierarchical end-to-end test engine
//!
//! Runs suites organized as Spec → Test → Context → Step with a bounded pool
//! of concurrent contexts, per-context variables, partial outcome matching and
//! an optional step debugger.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
pub mod suite;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use engine::{Engine, ExecutorRegistry, RunReport, RunnerDetails};
pub use suite::{load_file, parse_str, Format, RunInput};
