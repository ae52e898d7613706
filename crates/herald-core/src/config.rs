//! Engine configuration.
//!
//! Configuration can be built in code or loaded from a TOML document:
//!
//! ```toml
//! max_topic_length = 512
//! metrics_enabled = false
//! deferred_worker_name = "events"
//! ```

use crate::error::{HeraldError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum length of a specifier's textual form. `0` disables the check.
    #[serde(default = "default_max_topic_length")]
    pub max_topic_length: usize,

    /// Emit counters and gauges through the `metrics` facade.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Thread name used by the background deferred-delivery worker.
    #[serde(default = "default_worker_name")]
    pub deferred_worker_name: String,
}

// Default value functions
fn default_max_topic_length() -> usize {
    0
}

fn default_true() -> bool {
    true
}

fn default_worker_name() -> String {
    "herald-deferred".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_topic_length: default_max_topic_length(),
            metrics_enabled: true,
            deferred_worker_name: default_worker_name(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML for this struct.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| HeraldError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&contents)
    }

    /// Disable the topic length limit.
    #[must_use]
    pub fn unbounded_topics(mut self) -> Self {
        self.max_topic_length = 0;
        self
    }

    /// Reject specifiers longer than `max` bytes.
    #[must_use]
    pub fn with_max_topic_length(mut self, max: usize) -> Self {
        self.max_topic_length = max;
        self
    }
}
