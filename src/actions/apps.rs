//! Capability detection
//!
//! Searches `PATH` for the programs the built-in executors need and maps them
//! to the capability names steps require.

use crate::suite::{BROWSER_APP, HTTP_APP, SHELL_APP};

use super::code::PYTHON_PROGRAM;

/// Programs looked up for each capability; any one present enables it.
/// Interpreter entries name the exact program the code executor spawns.
const PROGRAMS: &[(&str, &[&str])] = &[
    (SHELL_APP, &["sh", "cmd"]),
    ("bash", &["bash"]),
    ("python", &[PYTHON_PROGRAM]),
    ("node", &["node"]),
    (BROWSER_APP, &["chromedriver", "geckodriver", "msedgedriver", "safaridriver"]),
];

/// Detect capabilities on this host, plus `extra` from the config file
pub fn detect_available_apps(extra: &[String]) -> Vec<String> {
    apps_with(|program| which::which(program).is_ok(), extra)
}

/// Capability list given a program lookup
pub fn apps_with(is_present: impl Fn(&str) -> bool, extra: &[String]) -> Vec<String> {
    let mut apps: Vec<String> = PROGRAMS
        .iter()
        .filter(|(_, programs)| programs.iter().any(|p| is_present(p)))
        .map(|(app, _)| app.to_string())
        .collect();

    // The HTTP client is built in
    apps.push(HTTP_APP.to_string());

    for app in extra {
        let app = app.trim().to_lowercase();
        if !app.is_empty() && !apps.contains(&app) {
            apps.push(app);
        }
    }
    apps
}
