//! Shell plugin for Corynth workflows.
//!
//! Two actions forward to the external-command collaborator:
//!
//! - `exec` runs a command line, through `/bin/sh -c` by default or split
//!   on whitespace and run directly when `shell` is `false`;
//! - `script` runs a script body with a named interpreter.
//!
//! Both report `output`, `stdout`, `stderr`, `exit_code`, and `success`.
//! A command that exits non-zero fails the step with
//! `command exited with status N`, still carrying those fields.

#[cfg(test)]
mod tests;

use corynth_plugin::command::{self, CommandBuilder, CommandRunner, CommandSpec, ProcessRunner};
use corynth_plugin::{
    ActionContext, ActionError, ActionRegistry, ActionResult, ActionSpec, Metadata, OutputSpec,
    ParamSpec, ParamType, ParameterSet, PluginRuntime, RuntimeError,
};
use serde_json::json;
use tracing::debug;

/// Tracing target for shell actions.
const SHELL_TARGET: &str = "corynth_plugin_shell";

/// Shell used by `exec` when `shell` is `true`.
pub const SHELL_PATH: &str = "/bin/sh";

/// Interpreter used by `script` when no `shell_type` is given.
pub const DEFAULT_SHELL_TYPE: &str = "bash";

/// Seconds allowed for a command when the request sets no `timeout`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Returns the shell plugin's identity.
#[must_use]
pub fn metadata() -> Metadata {
    Metadata::new("shell", "1.0.0")
        .with_description("Execute shell commands and scripts with support for various interpreters")
        .with_author("Corynth Team")
        .with_tags(["shell", "command", "script", "execution", "bash", "python"])
}

fn with_command_outputs(spec: ActionSpec) -> ActionSpec {
    spec.with_output(
        "output",
        OutputSpec::new(ParamType::String, "Combined stdout and stderr output"),
    )
    .with_output("stdout", OutputSpec::new(ParamType::String, "Standard output"))
    .with_output("stderr", OutputSpec::new(ParamType::String, "Standard error"))
    .with_output("exit_code", OutputSpec::new(ParamType::Number, "Process exit code"))
    .with_output(
        "success",
        OutputSpec::new(ParamType::Boolean, "Whether the exit code was 0"),
    )
}

fn with_process_inputs(spec: ActionSpec, subject: &str) -> ActionSpec {
    spec.with_input(
        "working_dir",
        ParamSpec::optional(
            ParamType::String,
            format!("Working directory for {subject} execution"),
        ),
    )
    .with_input(
        "timeout",
        ParamSpec::optional(ParamType::Number, "Timeout in seconds")
            .with_default(json!(DEFAULT_TIMEOUT_SECS)),
    )
}

/// Returns the `exec` action declaration.
#[must_use]
pub fn exec_spec() -> ActionSpec {
    let base = ActionSpec::new("exec", "Execute a shell command").with_input(
        "command",
        ParamSpec::required(ParamType::String, "Shell command to execute"),
    );
    let spec = with_process_inputs(base, "command")
        .with_input(
            "shell",
            ParamSpec::optional(ParamType::Boolean, "Run the command through /bin/sh")
                .with_default(json!(true)),
        )
        .with_input(
            "env",
            ParamSpec::optional(ParamType::Object, "Environment variables as key-value pairs"),
        );
    with_command_outputs(spec)
}

/// Returns the `script` action declaration.
#[must_use]
pub fn script_spec() -> ActionSpec {
    let base = ActionSpec::new("script", "Execute a script with the specified interpreter")
        .with_input(
            "script",
            ParamSpec::required(ParamType::String, "Script content to execute"),
        );
    let spec = with_process_inputs(base, "script")
        .with_input(
            "shell_type",
            ParamSpec::optional(
                ParamType::String,
                "Interpreter (bash, sh, python, python3, node, and so on)",
            )
            .with_default(json!(DEFAULT_SHELL_TYPE)),
        )
        .with_input(
            "env",
            ParamSpec::optional(ParamType::Object, "Environment variables as key-value pairs"),
        );
    with_command_outputs(spec)
}

/// Builds the shell plugin's runtime around a process runner.
///
/// # Errors
///
/// Returns [`RuntimeError::Registry`] if the action table is malformed.
pub fn runtime() -> Result<PluginRuntime<ProcessRunner>, RuntimeError> {
    runtime_with(ProcessRunner)
}

/// Builds the shell plugin's runtime around any command runner.
///
/// # Errors
///
/// Returns [`RuntimeError::Registry`] if the action table is malformed.
pub fn runtime_with<R>(runner: R) -> Result<PluginRuntime<R>, RuntimeError>
where
    R: CommandRunner + 'static,
{
    let mut registry = ActionRegistry::new();
    registry.register(exec_spec(), exec::<R>)?;
    registry.register(script_spec(), script::<R>)?;
    Ok(PluginRuntime::new(metadata(), registry, runner))
}

fn exec<R: CommandRunner>(context: &ActionContext<'_, R>) -> ActionResult {
    command::execute(&ExecBuilder, context.state(), context.params(), context.deadline())
}

fn script<R: CommandRunner>(context: &ActionContext<'_, R>) -> ActionResult {
    command::execute(
        &ScriptBuilder,
        context.state(),
        context.params(),
        context.deadline(),
    )
}

/// Applies the `working_dir` and `env` parameters shared by both actions.
fn with_process_settings(mut command: CommandSpec, params: &ParameterSet) -> CommandSpec {
    if let Some(dir) = params.str("working_dir").filter(|dir| !dir.is_empty()) {
        command = command.with_working_dir(dir);
    }
    command.with_envs(params.string_map("env"))
}

/// Translates `exec` parameters into a command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecBuilder;

impl CommandBuilder for ExecBuilder {
    fn build(&self, params: &ParameterSet) -> Result<CommandSpec, ActionError> {
        let line = params.require_str("command")?;
        let command = if params.bool("shell").unwrap_or(true) {
            CommandSpec::new(SHELL_PATH).with_args(["-c", line])
        } else {
            let mut words = line.split_whitespace();
            let program = words.next().ok_or_else(|| ActionError::new("empty command"))?;
            CommandSpec::new(program).with_args(words)
        };
        debug!(
            target: SHELL_TARGET,
            program = command.program(),
            args = command.args().len(),
            "built exec command"
        );
        Ok(with_process_settings(command, params))
    }
}

/// How an interpreter receives the script body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// As the argument to `-c`.
    Inline,
    /// On stdin, with `-` as the script path.
    Stdin,
}

/// Resolves an interpreter name to the program to run and how to feed it.
fn interpreter(shell_type: &str) -> (&str, Delivery) {
    match shell_type {
        "python" | "python3" => (shell_type, Delivery::Stdin),
        "node" | "nodejs" => ("node", Delivery::Stdin),
        _ => (shell_type, Delivery::Inline),
    }
}

/// Translates `script` parameters into a command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptBuilder;

impl CommandBuilder for ScriptBuilder {
    fn build(&self, params: &ParameterSet) -> Result<CommandSpec, ActionError> {
        let body = params.require_str("script")?;
        let shell_type = params
            .str("shell_type")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SHELL_TYPE);

        let (program, delivery) = interpreter(shell_type);
        let command = match delivery {
            Delivery::Inline => CommandSpec::new(program).with_args(["-c", body]),
            Delivery::Stdin => CommandSpec::new(program).with_arg("-").with_stdin(body),
        };
        debug!(
            target: SHELL_TARGET,
            interpreter = program,
            script_bytes = body.len(),
            "built script command"
        );
        Ok(with_process_settings(command, params))
    }
}
