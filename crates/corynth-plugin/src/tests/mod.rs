//! Crate-level integration and BDD tests.

use serde_json::{Value, json};

use crate::action::{ActionContext, ActionResult, Outcome};
use crate::error::RuntimeError;
use crate::registry::ActionRegistry;
use crate::runtime::PluginRuntime;
use crate::spec::{ActionSpec, Metadata, ParamSpec};
use crate::value::ParamType;


fn greet(context: &ActionContext<'_, ()>) -> ActionResult {
    let name = context.params().require_str("name")?;
    Ok(Outcome::new().with("greeting", format!("Hello, {name}")))
}

fn fetch(context: &ActionContext<'_, ()>) -> ActionResult {
    let url = context.params().require_str("url")?;
    let timeout = context.params().f64("timeout").unwrap_or_default();
    Ok(Outcome::new().with("url", url).with("timeout", timeout))
}

/// Two-action plugin used by the crate-level tests.
fn plugin() -> Result<PluginRuntime<()>, RuntimeError> {
    let mut registry = ActionRegistry::new();
    registry.register(
        ActionSpec::new("greet", "Greets someone")
            .with_input("name", ParamSpec::required(ParamType::String, "Who")),
        greet,
    )?;
    registry.register(
        ActionSpec::new("fetch", "Pretends to fetch a URL")
            .with_input("url", ParamSpec::required(ParamType::String, "Target"))
            .with_input(
                "timeout",
                ParamSpec::optional(ParamType::Number, "Seconds").with_default(json!(30)),
            ),
        fetch,
    )?;
    Ok(PluginRuntime::new(
        Metadata::new("greeter", "1.0.0").with_tags(["demo"]),
        registry,
        (),
    ))
}

fn run_plugin(args: &[&str], body: &[u8]) -> (Result<(), RuntimeError>, Vec<u8>) {
    let runtime = plugin().expect("plugin builds");
    let mut stdin = body;
    let mut stdout = Vec::new();
    let result = runtime.run(args.iter().copied(), &mut stdin, &mut stdout);
    (result, stdout)
}

#[test]
fn defaults_reach_the_handler() {
    let (result, stdout) = run_plugin(
        &["greeter", "fetch"],
        br#"{"url": "https://example.com"}"#,
    );
    result.expect("exchange completes");
    let document: Value = serde_json::from_slice(&stdout).expect("json");
    assert_eq!(
        document,
        json!({"url": "https://example.com", "timeout": 30.0})
    );
}

#[test]
fn every_mode_writes_exactly_one_document() {
    for args in [
        ["greeter", "metadata"],
        ["greeter", "actions"],
        ["greeter", "greet"],
        ["greeter", "fetch"],
        ["greeter", "badaction"],
    ] {
        let (_, stdout) = run_plugin(&args, b"");
        let text = String::from_utf8(stdout).expect("utf-8");
        let mut documents = serde_json::Deserializer::from_str(&text).into_iter::<Value>();
        assert!(documents.next().is_some_and(|doc| doc.is_ok()), "{args:?}");
        assert!(documents.next().is_none(), "{args:?}: {text}");
    }
}

#[test]
fn duplicate_registration_surfaces_as_build_error() {
    let mut registry: ActionRegistry<()> = ActionRegistry::new();
    registry
        .register(ActionSpec::new("greet", "first"), greet)
        .expect("first registration");
    let fault: RuntimeError = registry
        .register(ActionSpec::new("greet", "second"), greet)
        .map_err(RuntimeError::from)
        .expect_err("duplicate");
    assert_eq!(
        fault.to_string(),
        "failed to register actions: action 'greet' is already registered"
    );
    assert!(fault.is_reportable());
}
