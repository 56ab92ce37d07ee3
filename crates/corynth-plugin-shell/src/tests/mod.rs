//! Crate-level unit and BDD tests for the shell plugin.

use std::collections::BTreeMap;
use std::time::Duration;

use corynth_plugin::command::{CommandError, CommandOutput};
use corynth_plugin::{Deadline, codec};
use mockall::mock;
use rstest::rstest;
use serde_json::{Value, json};

use super::*;

#[cfg(unix)]
mod behaviour;

mock! {
    Runner {}
    impl CommandRunner for Runner {
        fn run(
            &self,
            command: &CommandSpec,
            deadline: Option<Deadline>,
        ) -> Result<CommandOutput, CommandError>;
    }
}

fn decoded(spec: &ActionSpec, request: &Value) -> ParameterSet {
    codec::decode(request.to_string().as_bytes(), spec).expect("request should decode")
}

fn exec_params(request: &Value) -> ParameterSet {
    decoded(&exec_spec(), request)
}

fn script_params(request: &Value) -> ParameterSet {
    decoded(&script_spec(), request)
}

/// Runs one exchange through a runtime backed by `runner`.
fn invoke(runner: MockRunner, action: &str, request: &Value) -> Value {
    let runtime = runtime_with(runner).expect("shell plugin builds");
    let body = request.to_string();
    let mut stdout = Vec::new();
    runtime
        .run(["shell", action], &mut body.as_bytes(), &mut stdout)
        .expect("exchange completes");
    serde_json::from_slice(&stdout).expect("one JSON document")
}

#[test]
fn exec_uses_the_shell_by_default() {
    let command = ExecBuilder
        .build(&exec_params(&json!({"command": "echo $HOME | wc -c"})))
        .expect("command builds");
    assert_eq!(command.program(), SHELL_PATH);
    assert_eq!(command.args(), ["-c", "echo $HOME | wc -c"]);
    assert!(command.stdin().is_none());
}

#[test]
fn exec_without_shell_splits_on_whitespace() {
    let command = ExecBuilder
        .build(&exec_params(
            &json!({"command": "  ls   -la\t/tmp ", "shell": false}),
        ))
        .expect("command builds");
    assert_eq!(command.program(), "ls");
    assert_eq!(command.args(), ["-la", "/tmp"]);
}

#[rstest]
#[case::empty(json!({"command": ""}))]
#[case::blank(json!({"command": "   ", "shell": false}))]
fn exec_rejects_empty_commands(#[case] request: Value) {
    let error = ExecBuilder
        .build(&exec_params(&request))
        .expect_err("empty command");
    assert!(error.message().contains("command"), "{}", error.message());
}

#[test]
fn working_dir_and_string_env_values_are_applied() {
    let command = ExecBuilder
        .build(&exec_params(&json!({
            "command": "env",
            "working_dir": "/srv/app",
            "env": {"STAGE": "prod", "RETRIES": 3, "DEBUG": "1"},
        })))
        .expect("command builds");
    assert_eq!(
        command.working_dir(),
        Some(std::path::Path::new("/srv/app"))
    );
    let expected: BTreeMap<String, String> = [("DEBUG", "1"), ("STAGE", "prod")]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
    assert_eq!(command.env(), &expected);
}

#[test]
fn empty_working_dir_is_ignored() {
    let command = ExecBuilder
        .build(&exec_params(&json!({"command": "pwd", "working_dir": ""})))
        .expect("command builds");
    assert!(command.working_dir().is_none());
}

#[rstest]
#[case::bash("bash", "bash", &["-c", "echo hi"], None)]
#[case::sh("sh", "sh", &["-c", "echo hi"], None)]
#[case::python("python", "python", &["-"], Some("echo hi"))]
#[case::python3("python3", "python3", &["-"], Some("echo hi"))]
#[case::node("node", "node", &["-"], Some("echo hi"))]
#[case::nodejs("nodejs", "node", &["-"], Some("echo hi"))]
#[case::other("zsh", "zsh", &["-c", "echo hi"], None)]
fn script_interpreters(
    #[case] shell_type: &str,
    #[case] program: &str,
    #[case] args: &[&str],
    #[case] stdin: Option<&str>,
) {
    let command = ScriptBuilder
        .build(&script_params(
            &json!({"script": "echo hi", "shell_type": shell_type}),
        ))
        .expect("command builds");
    assert_eq!(command.program(), program);
    assert_eq!(command.args(), args);
    assert_eq!(command.stdin(), stdin);
}

#[test]
fn script_defaults_to_bash() {
    let command = ScriptBuilder
        .build(&script_params(&json!({"script": "true"})))
        .expect("command builds");
    assert_eq!(command.program(), DEFAULT_SHELL_TYPE);
}

#[test]
fn exec_forwards_default_timeout_as_deadline() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(|command, deadline| {
            command.program() == SHELL_PATH
                && deadline.as_ref().map(Deadline::budget)
                    == Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        })
        .times(1)
        .returning(|_, _| Ok(CommandOutput::new("hello\n", "", 0)));

    let document = invoke(runner, "exec", &json!({"command": "echo hello"}));
    assert_eq!(
        document,
        json!({
            "output": "hello\n",
            "stdout": "hello\n",
            "stderr": "",
            "exit_code": 0,
            "success": true,
        })
    );
}

#[test]
fn non_zero_exit_is_a_failure_envelope_with_output() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(|_, _| Ok(CommandOutput::new("", "boom\n", 2)));
    let document = invoke(runner, "script", &json!({"script": "exit 2"}));
    assert_eq!(
        document,
        json!({
            "error": "command exited with status 2",
            "output": "boom\n",
            "stdout": "",
            "stderr": "boom\n",
            "exit_code": 2,
            "success": false,
        })
    );
}

#[test]
fn timeout_becomes_failure_envelope() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(|_, deadline| deadline.as_ref().map(Deadline::budget) == Some(Duration::from_secs(1)))
        .times(1)
        .returning(|command, _| {
            Err(CommandError::TimedOut {
                program: command.program().to_owned(),
                budget: Duration::from_secs(1),
                stdout: String::from("partial"),
                stderr: String::new(),
            })
        });
    let document = invoke(runner, "exec", &json!({"command": "sleep 10", "timeout": 1}));
    assert!(document.get("error").and_then(Value::as_str).is_some());
    assert_eq!(document.get("exit_code"), Some(&json!(-1)));
    assert_eq!(document.get("stdout"), Some(&json!("partial")));
}

#[test]
fn builder_errors_never_reach_the_runner() {
    let mut runner = MockRunner::new();
    runner.expect_run().never();
    let document = invoke(runner, "exec", &json!({"command": "   "}));
    assert_eq!(
        document,
        json!({"error": "parameter 'command' must not be empty"})
    );
}

#[test]
fn actions_are_exec_then_script() {
    let runtime = runtime().expect("shell plugin builds");
    let names: Vec<&str> = runtime
        .registry()
        .list()
        .into_iter()
        .map(ActionSpec::name)
        .collect();
    assert_eq!(names, ["exec", "script"]);
}
