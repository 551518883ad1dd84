//! Error types for the runner
//!
//! These errors cover malformed input and infrastructure faults. Step-level
//! outcomes (assertion mismatches, timeouts, ...) are never raised through
//! this type; see `engine::failure` for those.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported suite format '{0}'. Use .json, .yml or .yaml")]
    UnsupportedFormat(String),

    #[error("Invalid path expression '{expression}': {reason}")]
    InvalidPath { expression: String, reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to write file '{path}': {error}")]
    FileWrite { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Execution Errors ===
    #[error("Context '{context_id}' failed: {reason}")]
    ContextFailed { context_id: String, reason: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed input error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create an invalid path expression error
    pub fn invalid_path(expression: &str, reason: &str) -> Self {
        Self::InvalidPath {
            expression: expression.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a context failure error
    pub fn context_failed(context_id: &str, reason: impl Into<String>) -> Self {
        Self::ContextFailed {
            context_id: context_id.to_string(),
            reason: reason.into(),
        }
    }
}
