//! External-command collaborator.
//!
//! Plugins that wrap a CLI split the work in two: a [`CommandBuilder`]
//! translates decoded parameters into a [`CommandSpec`], and a
//! [`CommandRunner`] executes it under the handler's deadline. The
//! production runner is [`ProcessRunner`]; tests substitute a mock runner so
//! argument translation can be checked without spawning anything.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::action::{ActionError, ActionResult, Outcome};
use crate::deadline::Deadline;
use crate::params::ParameterSet;

/// Tracing target for external command execution.
const COMMAND_TARGET: &str = "corynth_plugin::command";

/// Interval between exit-status polls while a deadline is running.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exit code reported when a process produced no status of its own.
pub const NO_EXIT_CODE: i32 = -1;

/// A fully resolved external command.
///
/// # Example
///
/// ```
/// use corynth_plugin::command::CommandSpec;
///
/// let command = CommandSpec::new("/bin/sh")
///     .with_args(["-c", "echo $GREETING"])
///     .with_env("GREETING", "hello");
/// assert_eq!(command.program(), "/bin/sh");
/// assert_eq!(command.args(), ["-c", "echo $GREETING"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    stdin: Option<String>,
}

impl CommandSpec {
    /// Creates a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn with_args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable on top of the inherited environment.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets several environment variables.
    #[must_use]
    pub fn with_envs(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env.extend(vars);
        self
    }

    /// Runs the command in `dir` instead of the plugin's working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Feeds `input` to the command's stdin.
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Returns the program.
    #[must_use]
    pub const fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the environment overrides.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the working directory override.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Returns the stdin payload.
    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl CommandOutput {
    /// Creates an output record.
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Returns captured stdout.
    #[must_use]
    pub const fn stdout(&self) -> &str {
        self.stdout.as_str()
    }

    /// Returns captured stderr.
    #[must_use]
    pub const fn stderr(&self) -> &str {
        self.stderr.as_str()
    }

    /// Returns the exit code, or [`NO_EXIT_CODE`] if a signal ended the process.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns `true` for a zero exit code.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts the output into `{output, stdout, stderr, exit_code, success}`.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        let success = self.success();
        let combined = format!("{}{}", self.stdout, self.stderr);
        Outcome::new()
            .with("output", combined)
            .with("stdout", self.stdout)
            .with("stderr", self.stderr)
            .with("exit_code", self.exit_code)
            .with("success", success)
    }
}

/// Errors raised while running an external command.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that was requested.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Waiting for or talking to the process failed.
    #[error("I/O error while running '{program}': {source}")]
    Io {
        /// Program being run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The deadline passed and the process was killed.
    #[error("'{program}' timed out after {budget:?}")]
    TimedOut {
        /// Program being run.
        program: String,
        /// Budget that was exceeded.
        budget: Duration,
        /// Output captured before the kill.
        stdout: String,
        /// Error output captured before the kill.
        stderr: String,
    },
}

impl From<CommandError> for ActionError {
    fn from(error: CommandError) -> Self {
        let message = error.to_string();
        let base = Self::new(message)
            .with("exit_code", NO_EXIT_CODE)
            .with("success", false);
        match error {
            CommandError::TimedOut { stdout, stderr, .. } => {
                base.with("stdout", stdout).with("stderr", stderr)
            }
            CommandError::Spawn { .. } | CommandError::Io { .. } => base,
        }
    }
}

/// Translates decoded parameters into a command.
pub trait CommandBuilder {
    /// Builds the command for one request.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the parameters cannot form a command.
    fn build(&self, params: &ParameterSet) -> Result<CommandSpec, ActionError>;
}

/// Executes resolved commands.
pub trait CommandRunner {
    /// Runs `command` to completion or until `deadline` passes.
    ///
    /// A non-zero exit is not an error; it is reported in the output.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] if the process cannot be started, cannot be
    /// waited on, or outlives its deadline.
    fn run(
        &self,
        command: &CommandSpec,
        deadline: Option<Deadline>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Builds and runs a command, producing the standard command outcome.
///
/// # Errors
///
/// Returns the builder's error, the runner's error converted into an
/// [`ActionError`], or `command exited with status N` carrying the captured
/// output when the command exits non-zero.
pub fn execute(
    builder: &impl CommandBuilder,
    runner: &impl CommandRunner,
    params: &ParameterSet,
    deadline: Option<Deadline>,
) -> ActionResult {
    let command = builder.build(params)?;
    let output = runner.run(&command, deadline)?;
    if output.success() {
        return Ok(output.into_outcome());
    }
    let code = output.exit_code();
    debug!(target: COMMAND_TARGET, program = command.program(), code, "command exited non-zero");
    Err(ActionError::new(format!("command exited with status {code}"))
        .with_outcome(output.into_outcome()))
}

/// Runs commands as child processes of the plugin.
///
/// Stdout and stderr are drained on reader threads so a chatty child cannot
/// stall on a full pipe. When a deadline passes the child's whole process
/// group is killed and reaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        command: &CommandSpec,
        deadline: Option<Deadline>,
    ) -> Result<CommandOutput, CommandError> {
        let program = command.program();
        let mut child = spawn(command)?;

        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);
        let feeder = match (child.stdin.take(), command.stdin()) {
            (Some(pipe), Some(input)) => Some(feed(pipe, input.to_owned())),
            _ => None,
        };

        let waited = wait_for_exit(program, &mut child, deadline);
        if let Some(handle) = feeder {
            drop(handle.join());
        }
        let stdout = collect(stdout_reader);
        let stderr = collect(stderr_reader);

        match waited? {
            Some(status) => {
                let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
                debug!(
                    target: COMMAND_TARGET,
                    program,
                    exit_code,
                    stdout_bytes = stdout.len(),
                    stderr_bytes = stderr.len(),
                    "command exited"
                );
                Ok(CommandOutput::new(stdout, stderr, exit_code))
            }
            None => Err(CommandError::TimedOut {
                program: program.to_owned(),
                budget: deadline.as_ref().map(Deadline::budget).unwrap_or_default(),
                stdout,
                stderr,
            }),
        }
    }
}

fn spawn(command: &CommandSpec) -> Result<Child, CommandError> {
    let mut process = Command::new(command.program());
    process
        .args(command.args())
        .envs(command.env())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if command.stdin().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    if let Some(dir) = command.working_dir() {
        process.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        process.process_group(0);
    }

    debug!(
        target: COMMAND_TARGET,
        program = command.program(),
        args = command.args().len(),
        working_dir = ?command.working_dir(),
        "spawning command"
    );

    process.spawn().map_err(|source| CommandError::Spawn {
        program: command.program().to_owned(),
        source: Arc::new(source),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        // A read error ends the capture; whatever arrived is kept.
        drop(pipe.read_to_end(&mut buffer));
        buffer
    })
}

fn feed(mut pipe: impl Write + Send + 'static, input: String) -> JoinHandle<()> {
    thread::spawn(move || {
        // The child may exit without reading its input.
        drop(pipe.write_all(input.as_bytes()));
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|reader| reader.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Waits for the child, returning `None` if it was killed at the deadline.
fn wait_for_exit(
    program: &str,
    child: &mut Child,
    limit: Option<Deadline>,
) -> Result<Option<ExitStatus>, CommandError> {
    let io_error = |source: io::Error| CommandError::Io {
        program: program.to_owned(),
        source: Arc::new(source),
    };

    let Some(deadline) = limit else {
        return child.wait().map(Some).map_err(io_error);
    };

    loop {
        if let Some(status) = child.try_wait().map_err(io_error)? {
            return Ok(Some(status));
        }
        if deadline.is_expired() {
            warn!(
                target: COMMAND_TARGET,
                program,
                budget_ms = u64::try_from(deadline.budget().as_millis()).unwrap_or(u64::MAX),
                "command timed out, killing process group"
            );
            kill_process_group(child);
            drop(child.wait());
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline.remaining()));
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map(Pid::from_raw);
    match group {
        Ok(pid) if killpg(pid, Signal::SIGKILL).is_ok() => {}
        _ => drop(child.kill()),
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    drop(child.kill());
}
