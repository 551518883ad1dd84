//! Debug controller
//!
//! Per-context state machine gating step progression. A pause asks the
//! injected [`DebugPrompt`] for a decision; a prompt that reports itself as
//! non-interactive is never asked and the pause resolves to `Continue`, so
//! runs terminate with no operator attached.

use std::collections::HashSet;
use std::fmt;
use std::io::IsTerminal;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::suite::DebugOptions;

use super::report::StepStatus;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugState {
    /// Steps execute normally
    Running,
    /// Waiting for an operator decision
    Paused,
    /// Operator aborted; remaining steps are skipped
    Aborted,
}

impl fmt::Display for DebugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Operator decision at a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugDecision {
    Continue,
    Skip,
    Abort,
}

impl DebugDecision {
    /// Parse an operator reply (`c`, `s`, `a`, ...); empty means continue
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "" | "c" | "continue" => Some(Self::Continue),
            "s" | "skip" => Some(Self::Skip),
            "a" | "abort" | "q" | "quit" => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Where a pause happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausePoint {
    BeforeStep,
    AfterStep(StepStatus),
}

/// Information handed to the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pause {
    pub context_id: String,
    pub step_id: String,
    pub description: String,
    pub point: PausePoint,
}

impl fmt::Display for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.point {
            PausePoint::BeforeStep => write!(
                f,
                "[{}] paused before step '{}' ({})",
                self.context_id, self.step_id, self.description
            ),
            PausePoint::AfterStep(status) => write!(
                f,
                "[{}] paused after step '{}' ({}): {:?}",
                self.context_id, self.step_id, self.description, status
            ),
        }
    }
}

/// Source of operator decisions
#[async_trait::async_trait]
pub trait DebugPrompt: Send + Sync {
    /// Whether an operator can answer; when false `decide` is never called
    fn is_interactive(&self) -> bool;

    /// Block until the operator decides
    async fn decide(&self, pause: &Pause) -> DebugDecision;
}

/// Prompt for runs with no operator attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

#[async_trait::async_trait]
impl DebugPrompt for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn decide(&self, _pause: &Pause) -> DebugDecision {
        DebugDecision::Continue
    }
}

type InputLines = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Prompt reading decisions from the terminal
///
/// Interactive only when stdin is a terminal. Prompts from concurrent
/// contexts are serialized so answers cannot interleave. One line reader
/// lives for the whole run, so answers typed ahead of a prompt are kept.
pub struct TerminalPrompt {
    input: Mutex<InputLines>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }

    /// Read decisions from `reader` instead of stdin
    pub fn with_input(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            input: Mutex::new(reader.lines()),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TerminalPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalPrompt").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DebugPrompt for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    async fn decide(&self, pause: &Pause) -> DebugDecision {
        let mut lines = self.input.lock().await;
        let mut stderr = tokio::io::stderr();

        loop {
            let prompt = format!("{}\n  [c]ontinue, [s]kip, [a]bort > ", pause);
            if stderr.write_all(prompt.as_bytes()).await.is_err() {
                return DebugDecision::Continue;
            }
            let _ = stderr.flush().await;

            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(decision) = DebugDecision::parse(&line) {
                        return decision;
                    }
                }
                // Closed or unreadable stdin cannot answer
                Ok(None) | Err(_) => return DebugDecision::Continue,
            }
        }
    }
}

/// Per-context debug state machine
pub struct DebugController {
    context_id: String,
    step_through: bool,
    break_on_fail: bool,
    breakpoints: HashSet<String>,
    prompt: Arc<dyn DebugPrompt>,
    state: DebugState,
}

impl DebugController {
    pub fn new(context_id: impl Into<String>, options: &DebugOptions, prompt: Arc<dyn DebugPrompt>) -> Self {
        Self {
            context_id: context_id.into(),
            step_through: options.step_through,
            break_on_fail: options.break_on_fail,
            breakpoints: options.breakpoints.iter().cloned().collect(),
            prompt,
            state: DebugState::Running,
        }
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.state == DebugState::Aborted
    }

    /// Gate before a step runs
    pub async fn before_step(&mut self, step_id: &str, description: &str) -> DebugDecision {
        if self.is_aborted() {
            return DebugDecision::Abort;
        }
        if self.step_through || self.breakpoints.contains(step_id) {
            return self.pause(step_id, description, PausePoint::BeforeStep).await;
        }
        DebugDecision::Continue
    }

    /// Gate after a step ran; `Skip` here means continue
    pub async fn after_step(
        &mut self,
        step_id: &str,
        description: &str,
        status: StepStatus,
    ) -> DebugDecision {
        if self.is_aborted() {
            return DebugDecision::Abort;
        }
        let failing = status.is_failing();
        if self.step_through || (self.break_on_fail && failing) {
            return match self
                .pause(step_id, description, PausePoint::AfterStep(status))
                .await
            {
                DebugDecision::Skip => DebugDecision::Continue,
                decision => decision,
            };
        }
        DebugDecision::Continue
    }

    async fn pause(&mut self, step_id: &str, description: &str, point: PausePoint) -> DebugDecision {
        if !self.prompt.is_interactive() {
            tracing::debug!(
                context = %self.context_id,
                step = %step_id,
                "Pause auto-resolved to continue (non-interactive)"
            );
            return DebugDecision::Continue;
        }

        self.state = DebugState::Paused;
        let pause = Pause {
            context_id: self.context_id.clone(),
            step_id: step_id.to_string(),
            description: description.to_string(),
            point,
        };
        let decision = self.prompt.decide(&pause).await;
        tracing::info!(
            context = %self.context_id,
            step = %step_id,
            ?decision,
            "Debug decision"
        );

        self.state = match decision {
            DebugDecision::Abort => DebugState::Aborted,
            DebugDecision::Continue | DebugDecision::Skip => DebugState::Running,
        };
        decision
    }
}
