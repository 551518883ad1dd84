//! Configuration file handling

use serde::Deserialize;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Runner defaults
    #[serde(default)]
    pub runner: RunnerDefaults,

    /// Extra capabilities to advertise to executors
    #[serde(default)]
    pub apps: AppsConfig,

    /// HTTP executor settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Runner defaults, overridden by the suite file's own config block
#[derive(Debug, Deserialize)]
pub struct RunnerDefaults {
    /// Maximum number of contexts executing at once
    #[serde(default = "default_concurrent_runners")]
    pub concurrent_runners: usize,

    /// Timeout applied to steps that do not declare their own
    #[serde(default)]
    pub default_step_timeout_ms: Option<u64>,

    /// Whether steps flagged `unsafe` may run
    #[serde(default)]
    pub allow_unsafe_steps: bool,
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self {
            concurrent_runners: default_concurrent_runners(),
            default_step_timeout_ms: None,
            allow_unsafe_steps: false,
        }
    }
}

fn default_concurrent_runners() -> usize {
    1
}

/// Capability overrides
#[derive(Debug, Deserialize, Default)]
pub struct AppsConfig {
    /// Names appended to the detected capability list (e.g. "browser")
    #[serde(default)]
    pub extra: Vec<String>,
}

/// HTTP settings in seconds
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    /// Request timeout applied by the HTTP client
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("e2e-runner/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
