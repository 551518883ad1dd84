//! Suite loading and validation
//!
//! Reads a suite tree from JSON or YAML, validates the fields the engine
//! relies on and assigns ids to contexts and steps that do not carry one.

use std::path::Path;

use crate::common::{Error, Result};

use super::model::RunInput;

/// Supported suite file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "yml" | "yaml" => Ok(Format::Yaml),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load, validate and prepare a suite file
pub fn load_file(path: &Path) -> Result<RunInput> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    parse_str(&content, format)
}

/// Parse, validate and prepare suite text
pub fn parse_str(content: &str, format: Format) -> Result<RunInput> {
    let input: RunInput = match format {
        Format::Json => serde_json::from_str(content)
            .map_err(|e| Error::malformed(format!("invalid suite JSON: {}", e)))?,
        Format::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::malformed(format!("invalid suite YAML: {}", e)))?,
    };
    prepare(input)
}

/// Validate an input tree and assign missing ids
///
/// Idempotent: ids that are already present are kept.
pub fn prepare(mut input: RunInput) -> Result<RunInput> {
    if input.config.concurrent_runners == Some(0) {
        return Err(Error::malformed("concurrentRunners must be at least 1"));
    }

    for spec in &mut input.specs {
        if spec.spec_id.trim().is_empty() {
            return Err(Error::malformed("specId must not be empty"));
        }
        for test in &mut spec.tests {
            if test.test_id.trim().is_empty() {
                return Err(Error::malformed(format!(
                    "testId must not be empty (spec '{}')",
                    spec.spec_id
                )));
            }
            for (ci, context) in test.contexts.iter_mut().enumerate() {
                let context_id = match &context.context_id {
                    Some(id) if !id.trim().is_empty() => id.clone(),
                    _ => format!("{}-context-{}", test.test_id, ci + 1),
                };
                for (si, step) in context.steps.iter_mut().enumerate() {
                    if step.step_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                        step.step_id = Some(format!("{}-step-{}", context_id, si + 1));
                    }
                }
                context.context_id = Some(context_id);
            }
        }
    }

    Ok(input)
}
