//! Workspace configuration loaded from `config.json` in the state directory.
//!
//! Everything is optional; CLI flags override config values, and the
//! `DCLERK_CLASSIFIER` environment variable is the last resort for the
//! classifier command.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable consulted when neither CLI nor config names a
/// classifier command.
pub const CLASSIFIER_ENV_VAR: &str = "DCLERK_CLASSIFIER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Keyword matches below this confidence go to the classifier.
    pub llm_threshold: Option<f64>,
    /// Decisions below this confidence need human approval.
    pub approval_threshold: Option<f64>,
    /// Subprocess classifier: a shell-words command line.
    pub classifier_command: Option<String>,
    /// HTTP classifier: an OpenAI-compatible chat-completions endpoint.
    pub classifier_endpoint: Option<String>,
    pub classifier_model: Option<String>,
    pub classifier_api_key: Option<String>,
}

impl WorkspaceConfig {
    /// Load the workspace config; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(WorkspaceConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))
    }
}
