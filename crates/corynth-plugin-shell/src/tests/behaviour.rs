//! Behaviour-driven tests for the shell actions against real processes.

use std::path::PathBuf;

use corynth_plugin::command::ProcessRunner;
use corynth_plugin::{Envelope, codec};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::{exec_spec, runtime_with, script_spec};

#[derive(Default)]
struct ShellWorld {
    request: Map<String, Value>,
    workdir: Option<TempDir>,
    envelope: Option<Envelope>,
}

#[fixture]
fn world() -> ShellWorld {
    ShellWorld::default()
}

fn unquote(text: &str) -> &str {
    text.trim_matches('"')
}

fn run_action(world: &mut ShellWorld, action: &str) {
    let spec = if action == "exec" {
        exec_spec()
    } else {
        script_spec()
    };
    let body = Value::Object(world.request.clone()).to_string();
    let params = codec::decode(body.as_bytes(), &spec).expect("request should decode");
    let runtime = runtime_with(ProcessRunner).expect("shell plugin builds");
    world.envelope = Some(runtime.registry().dispatch(&ProcessRunner, action, params));
}

fn envelope(world: &ShellWorld) -> &Envelope {
    world.envelope.as_ref().expect("action has run")
}

fn field<'a>(world: &'a ShellWorld, name: &str) -> &'a str {
    envelope(world)
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("the command {command}")]
fn given_command(world: &mut ShellWorld, command: String) {
    world
        .request
        .insert(String::from("command"), json!(unquote(&command)));
}

#[given("the script {script} for interpreter {interpreter}")]
fn given_script(world: &mut ShellWorld, script: String, interpreter: String) {
    world
        .request
        .insert(String::from("script"), json!(unquote(&script)));
    world
        .request
        .insert(String::from("shell_type"), json!(unquote(&interpreter)));
}

#[given("a temporary working directory")]
fn given_workdir(world: &mut ShellWorld) {
    let dir = tempfile::tempdir().expect("temp dir");
    world.request.insert(
        String::from("working_dir"),
        json!(dir.path().to_string_lossy()),
    );
    world.workdir = Some(dir);
}

#[given("the environment variable {key} set to {value}")]
fn given_env(world: &mut ShellWorld, key: String, value: String) {
    let mut vars = Map::new();
    vars.insert(unquote(&key).to_owned(), json!(unquote(&value)));
    world.request.insert(String::from("env"), Value::Object(vars));
}

#[given("a timeout of {seconds} second")]
fn given_timeout(world: &mut ShellWorld, seconds: u64) {
    world.request.insert(String::from("timeout"), json!(seconds));
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the exec action runs")]
fn when_exec(world: &mut ShellWorld) {
    run_action(world, "exec");
}

#[when("the script action runs")]
fn when_script(world: &mut ShellWorld) {
    run_action(world, "script");
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("stdout is {expected}")]
fn then_stdout(world: &mut ShellWorld, expected: String) {
    assert_eq!(field(world, "stdout").trim_end(), unquote(&expected));
}

#[then("stderr is {expected}")]
fn then_stderr(world: &mut ShellWorld, expected: String) {
    assert_eq!(field(world, "stderr").trim_end(), unquote(&expected));
}

#[then("the command ran in the working directory")]
fn then_stdout_is_workdir(world: &mut ShellWorld) {
    let dir = world.workdir.as_ref().expect("working directory created");
    let expected: PathBuf = dir.path().canonicalize().expect("canonical path");
    let reported = PathBuf::from(field(world, "stdout").trim_end());
    assert_eq!(
        reported.canonicalize().expect("reported path exists"),
        expected
    );
}

#[then("the command succeeded")]
fn then_succeeded(world: &mut ShellWorld) {
    assert_eq!(envelope(world).get("success"), Some(&json!(true)));
    assert_eq!(envelope(world).get("exit_code"), Some(&json!(0)));
}

#[then("the action fails with exit code {code}")]
fn then_exit_code(world: &mut ShellWorld, code: i64) {
    let expected = format!("command exited with status {code}");
    assert_eq!(envelope(world).error(), Some(expected.as_str()));
    assert_eq!(envelope(world).get("exit_code"), Some(&json!(code)));
    assert_eq!(envelope(world).get("success"), Some(&json!(false)));
}

#[then("the action fails with a timeout")]
fn then_timed_out(world: &mut ShellWorld) {
    let message = envelope(world).error().unwrap_or_default();
    assert!(message.contains("timed out"), "{message}");
    assert_eq!(envelope(world).get("exit_code"), Some(&json!(-1)));
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/shell.feature", index = 0)]
fn command_output(world: ShellWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/shell.feature", index = 1)]
fn failing_command(world: ShellWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/shell.feature", index = 2)]
fn working_directory(world: ShellWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/shell.feature", index = 3)]
fn environment(world: ShellWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/shell.feature", index = 4)]
fn timeout(world: ShellWorld) {
    let _ = world;
}
