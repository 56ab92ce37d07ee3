//! Process-level driver for plugin binaries.
//!
//! A plugin binary hands its [`Metadata`], its [`ActionRegistry`], and its
//! process-wide state to [`PluginRuntime`], then calls [`launch`]. The
//! runtime reads the mode from the first argument, reads stdin only for
//! execute requests, and writes exactly one JSON document to stdout.
//!
//! The exit status reflects protocol faults only. A handler failure, a
//! decode failure, or an unknown action is a completed exchange and exits
//! with status 0.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, warn};

use crate::codec;
use crate::config::PluginConfig;
use crate::envelope::{Envelope, write_document};
use crate::error::RuntimeError;
use crate::params::ParameterSet;
use crate::registry::ActionRegistry;
use crate::spec::Metadata;
use crate::telemetry;

/// Tracing target for runtime operations.
const RUNTIME_TARGET: &str = "corynth_plugin::runtime";

/// Program name used when the real `argv[0]` is unavailable.
const FALLBACK_PROGRAM: &str = "corynth-plugin";

/// Command line accepted by every plugin binary.
///
/// Only the first word is meaningful. Help and version flags are disabled
/// so that any word, including `--help`, reaches the registry as an action
/// name.
#[derive(Debug, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Invocation {
    /// `metadata`, `actions`, or an action name, then ignored extras.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Metadata,
    Actions,
    Execute(String),
}

impl From<String> for Mode {
    fn from(word: String) -> Self {
        match word.as_str() {
            "metadata" => Self::Metadata,
            "actions" => Self::Actions,
            _ => Self::Execute(word),
        }
    }
}

/// A plugin's identity, action table, and shared state.
///
/// # Example
///
/// ```
/// use corynth_plugin::{
///     ActionContext, ActionRegistry, ActionResult, ActionSpec, Metadata, Outcome,
///     PluginRuntime,
/// };
///
/// fn ping(_context: &ActionContext<'_, ()>) -> ActionResult {
///     Ok(Outcome::new().with("pong", true))
/// }
///
/// let mut registry = ActionRegistry::new();
/// registry
///     .register(ActionSpec::new("ping", "Liveness probe"), ping)
///     .expect("registration succeeds");
/// let runtime = PluginRuntime::new(Metadata::new("probe", "0.1.0"), registry, ());
///
/// let mut stdout = Vec::new();
/// runtime
///     .run(["probe", "ping"], &mut "".as_bytes(), &mut stdout)
///     .expect("exchange completes");
/// assert_eq!(stdout, b"{\"pong\":true}\n");
/// ```
#[derive(Debug)]
pub struct PluginRuntime<S> {
    metadata: Metadata,
    registry: ActionRegistry<S>,
    state: S,
    default_timeout: Option<Duration>,
}

impl<S> PluginRuntime<S> {
    /// Creates a runtime with no fallback deadline.
    #[must_use]
    pub const fn new(metadata: Metadata, registry: ActionRegistry<S>, state: S) -> Self {
        Self {
            metadata,
            registry,
            state,
            default_timeout: None,
        }
    }

    /// Sets the deadline applied to requests without a `timeout` parameter.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the plugin metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the action registry.
    #[must_use]
    pub const fn registry(&self) -> &ActionRegistry<S> {
        &self.registry
    }

    /// Returns the fallback deadline.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Performs one protocol exchange.
    ///
    /// `args` includes the program name, as from [`std::env::args_os`].
    /// A missing mode is reported on `stdout` before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingMode`] or
    /// [`RuntimeError::InvalidInvocation`] for an unusable command line, and
    /// [`RuntimeError::Serialize`] or [`RuntimeError::Write`] when the
    /// response cannot be delivered.
    pub fn run<I, T>(
        &self,
        args: I,
        stdin: &mut impl Read,
        stdout: &mut impl Write,
    ) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mode = match parse_mode(args) {
            Ok(mode) => mode,
            Err(fault) => {
                write_document(stdout, &Envelope::failure(fault.to_string()))?;
                return Err(fault);
            }
        };

        match mode {
            Mode::Metadata => {
                debug!(target: RUNTIME_TARGET, plugin = self.metadata.name(), "writing metadata");
                write_document(stdout, &self.metadata)
            }
            Mode::Actions => {
                debug!(
                    target: RUNTIME_TARGET,
                    plugin = self.metadata.name(),
                    actions = self.registry.len(),
                    "writing action table"
                );
                write_document(stdout, &self.registry.table())
            }
            Mode::Execute(action) => {
                let envelope = self.execute(&action, stdin);
                write_document(stdout, &envelope)
            }
        }
    }

    fn execute(&self, action: &str, stdin: &mut impl Read) -> Envelope {
        let mut raw = Vec::new();
        if let Err(source) = stdin.read_to_end(&mut raw) {
            warn!(target: RUNTIME_TARGET, action, error = %source, "failed to read request");
            return Envelope::failure(format!("failed to read input: {source}"));
        }

        let params = match self.registry.spec(action) {
            Some(spec) => match codec::decode(&raw, spec) {
                Ok(params) => params,
                Err(fault) => {
                    debug!(
                        target: RUNTIME_TARGET,
                        action,
                        parameter = fault.parameter(),
                        error = %fault,
                        "request rejected"
                    );
                    return Envelope::failure(fault.to_string());
                }
            },
            None => ParameterSet::new(),
        };

        self.registry
            .dispatch_within(&self.state, action, params, self.default_timeout)
    }
}

fn parse_mode<I, T>(args: I) -> Result<Mode, RuntimeError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let invocation =
        Invocation::try_parse_from(args).map_err(|fault| RuntimeError::InvalidInvocation {
            message: fault.kind().to_string(),
        })?;
    let mut words = invocation.words.into_iter();
    let mode = words.next();
    if !words.as_slice().is_empty() {
        debug!(
            target: RUNTIME_TARGET,
            ignored = words.len(),
            "ignoring arguments after the mode"
        );
    }
    mode.filter(|word| !word.is_empty())
        .map(Mode::from)
        .ok_or(RuntimeError::MissingMode)
}

/// Runs a plugin binary against the real process environment.
///
/// Configuration is loaded first, falling back to defaults when a layer is
/// malformed so discovery keeps working. Telemetry is then installed on
/// stderr, the plugin's `build` closure assembles the runtime, and one
/// exchange is performed over the real stdin and stdout.
///
/// Returns a failing exit code for protocol faults only.
pub fn launch<S, F>(build: F) -> ExitCode
where
    F: FnOnce(&PluginConfig) -> Result<PluginRuntime<S>, RuntimeError>,
{
    let args: Vec<OsString> = std::env::args_os().collect();
    let program = args
        .first()
        .and_then(|arg| arg.to_str())
        .unwrap_or(FALLBACK_PROGRAM)
        .to_owned();

    let (config, config_error) = match PluginConfig::load_for(&program) {
        Ok(config) => (config, None),
        Err(fault) => (PluginConfig::default(), Some(fault)),
    };
    if let Err(fault) = telemetry::initialise(&config) {
        writeln!(io::stderr().lock(), "{fault}").ok();
    }
    if let Some(fault) = config_error {
        warn!(
            target: RUNTIME_TARGET,
            error = %fault,
            "configuration could not be loaded; using defaults"
        );
    }

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    let runtime = match build(&config) {
        Ok(runtime) => {
            let fallback = runtime.default_timeout().or_else(|| config.default_timeout());
            runtime.with_default_timeout(fallback)
        }
        Err(fault) => {
            error!(target: RUNTIME_TARGET, error = %fault, "plugin failed to initialise");
            write_document(&mut writer, &Envelope::failure(fault.to_string())).ok();
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    match runtime.run(args, &mut reader, &mut writer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            error!(target: RUNTIME_TARGET, error = %fault, "plugin exchange failed");
            ExitCode::FAILURE
        }
    }
}
