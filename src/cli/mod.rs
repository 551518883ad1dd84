//! CLI command handling
//!
//! Loads suite files, merges settings from the command line and the config
//! file, runs the engine and formats output.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use colored::{ColoredString, Colorize};

use crate::actions;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::engine::{Engine, RunReport, StepResult, StepStatus, TerminalPrompt, Verdict};
use crate::suite::{self, DebugOptions, DebugSetting, RunConfig, RunInput};

/// Log filter for commands that do not run a suite
const QUIET_DIRECTIVE: &str = "e2e_runner=warn,warn";

/// Settings given on the command line for `run`
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub concurrent_runners: Option<usize>,
    pub debug: DebugOptions,
    pub allow_unsafe: bool,
    pub step_timeout: Option<u64>,
}

impl RunOverrides {
    /// Flags given on the command line that the suite's own config overrides
    pub fn ignored_by(&self, run: &RunConfig) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.concurrent_runners.is_some() && run.concurrent_runners.is_some() {
            ignored.push("--concurrent-runners");
        }
        if run.debug.is_some() {
            if self.debug.step_through {
                ignored.push("--step-through");
            }
            if self.debug.break_on_fail {
                ignored.push("--break-on-fail");
            }
            if !self.debug.breakpoints.is_empty() {
                ignored.push("--break");
            }
        }
        if self.allow_unsafe && run.allow_unsafe_steps.is_some() {
            ignored.push("--allow-unsafe");
        }
        if self.step_timeout.is_some() && run.default_step_timeout.is_some() {
            ignored.push("--step-timeout");
        }
        ignored
    }
}

/// Dispatch a CLI command
///
/// Returns whether the command succeeded; a run with failing or erroring
/// contexts is not a success.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            path,
            concurrent_runners,
            step_through,
            break_on_fail,
            breakpoints,
            allow_unsafe,
            step_timeout,
            output,
            log_file,
            verbose,
        } => {
            let config = Config::load()?;
            let overrides = RunOverrides {
                concurrent_runners,
                debug: DebugOptions {
                    step_through,
                    break_on_fail,
                    breakpoints,
                },
                allow_unsafe,
                step_timeout,
            };
            let input = suite::load_file(&path)?;

            let directive = input.config.log_level.directive();
            let _log_guard = if log_file {
                logging::init_with_file(directive).map(|(file, guard)| {
                    tracing::info!("Writing logs to {}", file.display());
                    guard
                })
            } else {
                logging::init_cli(directive);
                None
            };

            for flag in overrides.ignored_by(&input.config) {
                tracing::warn!("{} is ignored: the suite config sets this option", flag);
            }
            let input = apply_overrides(input, &overrides, &config);

            let engine = Engine::new(actions::default_registry(&config)?)
                .with_details(actions::runner_details(&config))
                .with_prompt(Arc::new(TerminalPrompt::new()));

            println!(
                "\n{} {}",
                "Running Suite:".blue().bold(),
                path.display().to_string().white().bold()
            );

            let report = engine.run(input).await?;
            print_report(&report, verbose);

            if let Some(output) = output {
                write_report(&report, &output)?;
                println!("Report written to {}", output.display());
            }

            Ok(!report.summary.has_failures())
        }

        Commands::Validate { path } => {
            logging::init_cli(QUIET_DIRECTIVE);
            let input = suite::load_file(&path)?;
            let config = Config::load()?;
            let apps = actions::detect_available_apps(&config.apps.extra);
            print_validation(&input, &apps);
            Ok(true)
        }

        Commands::Apps { json } => {
            logging::init_cli(QUIET_DIRECTIVE);
            let config = Config::load()?;
            let details = actions::runner_details(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!("Platform: {}", details.environment.platform);
                println!("Available apps:");
                for app in &details.available_apps {
                    println!("  {} {}", "✓".green(), app);
                }
            }
            Ok(true)
        }
    }
}

/// Fill settings the suite leaves unset: command line first, then config file
pub fn apply_overrides(mut input: RunInput, overrides: &RunOverrides, config: &Config) -> RunInput {
    let run = &mut input.config;

    if run.concurrent_runners.is_none() {
        run.concurrent_runners = Some(
            overrides
                .concurrent_runners
                .unwrap_or(config.runner.concurrent_runners),
        );
    }
    if run.debug.is_none() && overrides.debug.is_enabled() {
        run.debug = Some(DebugSetting::Options(overrides.debug.clone()));
    }
    if run.allow_unsafe_steps.is_none() {
        run.allow_unsafe_steps = Some(overrides.allow_unsafe || config.runner.allow_unsafe_steps);
    }
    if run.default_step_timeout.is_none() {
        run.default_step_timeout = overrides
            .step_timeout
            .or(config.runner.default_step_timeout_ms);
    }

    input
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|e| Error::FileWrite {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn verdict_mark(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Pass => "✓".green().bold(),
        Verdict::Fail => "✗".red().bold(),
        Verdict::Error => "!".yellow().bold(),
    }
}

fn status_label(status: StepStatus) -> ColoredString {
    match status {
        StepStatus::Pass => "pass".green(),
        StepStatus::Fail => "fail".red(),
        StepStatus::Error => "error".yellow(),
        StepStatus::Skipped => "skipped".dimmed(),
    }
}

fn print_step(step: &StepResult) {
    println!(
        "      {:<8} {} {}",
        status_label(step.result),
        step.step_id,
        format!("({}ms)", step.duration_ms).dimmed()
    );
    if let Some(failure) = &step.failure {
        println!("               {}", failure.message.red());
    }
    for capture in &step.capture_failures {
        println!(
            "               {} {} = {}: {}",
            "capture".yellow(),
            capture.variable,
            capture.expression,
            capture.reason
        );
    }
}

fn print_report(report: &RunReport, verbose: bool) {
    for spec in &report.specs {
        println!("\n{} {}", verdict_mark(spec.result), spec.spec_id.bold());
        for test in &spec.tests {
            println!("  {} {}", verdict_mark(test.result), test.test_id);
            for context in &test.contexts {
                println!("    {} {}", verdict_mark(context.result), context.context_id);
                if let Some(error) = &context.error {
                    println!("      {}", error.yellow());
                }
                for step in &context.steps {
                    if verbose || step.result.is_failing() {
                        print_step(step);
                    }
                }
            }
        }
    }

    let summary = &report.summary;
    println!(
        "\n{} contexts: {} passed, {} failed, {} errored",
        "Summary:".blue().bold(),
        summary.contexts.pass.to_string().green(),
        summary.contexts.fail.to_string().red(),
        summary.contexts.error.to_string().yellow()
    );
    println!(
        "         steps: {} passed, {} failed, {} errored, {} skipped",
        summary.steps.pass.to_string().green(),
        summary.steps.fail.to_string().red(),
        summary.steps.error.to_string().yellow(),
        summary.steps.skipped.to_string().dimmed()
    );

    if summary.has_failures() {
        println!("\n{}\n", "Run Failed".red().bold());
    } else {
        println!("\n{}\n", "Run Passed".green().bold());
    }
}

fn print_validation(input: &RunInput, apps: &[String]) {
    let mut tests = 0;
    let mut contexts = 0;
    let mut steps = 0;
    let mut missing = BTreeSet::new();

    for spec in &input.specs {
        tests += spec.tests.len();
        for test in &spec.tests {
            contexts += test.contexts.len();
            for context in &test.contexts {
                steps += context.steps.len();
                for step in &context.steps {
                    if let Some(app) = step.action.required_app() {
                        if !apps.iter().any(|a| a.eq_ignore_ascii_case(&app)) {
                            missing.insert(app);
                        }
                    }
                }
            }
        }
    }

    println!(
        "{} {} specs, {} tests, {} contexts, {} steps",
        "✓".green().bold(),
        input.specs.len(),
        tests,
        contexts,
        steps
    );
    for app in missing {
        println!(
            "  {} steps require '{}', which is not available on this host",
            "warning:".yellow().bold(),
            app
        );
    }
}
