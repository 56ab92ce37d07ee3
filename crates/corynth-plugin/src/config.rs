//! Layered configuration shared by every plugin binary.
//!
//! Values come from defaults, an optional `.corynth.toml`, and `CORYNTH_*`
//! environment variables, merged by `ortho_config`. The orchestrator owns
//! the plugin command line, so command-line flags are never consulted at
//! launch.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Filter applied when none is configured: plugins stay quiet unless asked.
pub const DEFAULT_LOG_FILTER: &str = "warn";

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// How diagnostics are rendered on stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for orchestrators that collect stderr.
    #[default]
    Json,
    /// Terse text without timestamps, for running a plugin by hand.
    Compact,
}

/// Configuration common to all plugins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CORYNTH")]
pub struct PluginConfig {
    /// `tracing` filter expression for stderr diagnostics.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Diagnostic output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Deadline applied to actions whose request carries no `timeout`.
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
            default_timeout_secs: None,
        }
    }
}

impl PluginConfig {
    /// Loads configuration from files and the environment only.
    ///
    /// `program` stands in for `argv[0]`; the rest of the real command line
    /// belongs to the plugin protocol.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when a layer is malformed.
    pub fn load_for(program: &str) -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([program])
    }

    /// Returns the log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the fallback deadline, ignoring a zero value.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }
}
