//! Structured diagnostics for plugin processes.
//!
//! Stdout belongs to the protocol, so every event goes to stderr. JSON lines
//! are the default because orchestrators usually capture plugin stderr into
//! their own logs; the compact format is meant for a developer running a
//! plugin by hand.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, PluginConfig};

/// Format chosen by the first successful installation.
static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Errors raised while installing the diagnostics subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser error text.
        message: String,
    },

    /// A global subscriber was already installed by someone else.
    #[error("failed to install diagnostics subscriber: {message}")]
    Install {
        /// Underlying error text.
        message: String,
    },
}

/// Installs the stderr subscriber described by `config`.
///
/// Only the first successful call installs anything; later calls return the
/// format that call chose and ignore `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Install`] when another global subscriber exists.
pub fn initialise(config: &PluginConfig) -> Result<LogFormat, TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).copied()
}

fn filter_for(config: &PluginConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::builder()
        .parse(config.log_filter())
        .map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })
}

fn install(config: &PluginConfig) -> Result<LogFormat, TelemetryError> {
    let filter = filter_for(config)?;
    let format = config.log_format();
    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .compact()
            .without_time()
            .with_ansi(io::stderr().is_terminal())
            .try_init(),
    };
    installed.map_err(|error| TelemetryError::Install {
        message: error.to_string(),
    })?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_names_the_expression() {
        let config = PluginConfig {
            log_filter: String::from("[unterminated"),
            ..PluginConfig::default()
        };
        let error = install(&config).expect_err("filter should not parse");
        assert!(
            matches!(&error, TelemetryError::Filter { filter, .. } if filter == "[unterminated")
        );
        assert!(error.to_string().starts_with("invalid log filter '[unterminated'"));
    }

    #[test]
    fn directive_filters_parse() {
        let config = PluginConfig {
            log_filter: String::from("warn,corynth_plugin::command=debug"),
            ..PluginConfig::default()
        };
        assert!(filter_for(&config).is_ok());
    }

    #[test]
    fn repeated_initialisation_keeps_the_first_format() {
        let first = initialise(&PluginConfig::default()).expect("first installation");
        let compact = PluginConfig {
            log_format: LogFormat::Compact,
            ..PluginConfig::default()
        };
        let second = initialise(&compact).expect("later calls are no-ops");
        assert_eq!(first, LogFormat::Json);
        assert_eq!(second, first);
    }
}
