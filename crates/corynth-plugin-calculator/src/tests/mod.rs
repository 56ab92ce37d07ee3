//! Crate-level unit and BDD tests for the calculator plugin.

use corynth_plugin::{Envelope, ParameterSet};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;


/// Runs `calculate` through the registry the binary uses.
fn calculate_with(request: Value) -> Envelope {
    let runtime = runtime().expect("calculator builds");
    let params = corynth_plugin::codec::decode(request.to_string().as_bytes(), &calculate_spec())
        .expect("request should decode");
    runtime.registry().dispatch(&(), "calculate", params)
}

#[test]
fn integral_result_is_an_integer() {
    let envelope = calculate_with(json!({"expression": "2 + 2 * 3"}));
    assert_eq!(
        envelope.to_value(),
        json!({"result": 8, "expression": "2 + 2 * 3"})
    );
    assert_eq!(serde_json::to_string(&envelope.get("result")).ok().as_deref(), Some("8"));
}

#[rstest]
#[case::default_precision(json!({"expression": "10 / 3"}), json!(3.33))]
#[case::explicit_precision(json!({"expression": "10 / 3", "precision": 4}), json!(3.3333))]
#[case::zero_precision(json!({"expression": "10 / 3", "precision": 0}), json!(3))]
#[case::negative_precision(json!({"expression": "2.5", "precision": -3}), json!(3))]
#[case::fractional_precision(json!({"expression": "pi", "precision": 1.9}), json!(3.1))]
#[case::rounds_to_integer(json!({"expression": "1.999"}), json!(2))]
#[case::huge_at_default_precision(json!({"expression": "1e307"}), json!(1e307))]
#[case::huge_at_max_precision(json!({"expression": "1e300", "precision": 15}), json!(1e300))]
fn results_are_rounded(#[case] request: Value, #[case] expected: Value) {
    let envelope = calculate_with(request);
    assert_eq!(envelope.get("result"), Some(&expected));
}

#[test]
fn evaluation_failure_keeps_expression() {
    let envelope = calculate_with(json!({"expression": "1 / 0"}));
    assert_eq!(
        envelope.to_value(),
        json!({"error": "invalid expression: division by zero", "expression": "1 / 0"})
    );
}

#[test]
fn empty_expression_is_rejected() {
    let envelope = calculate_with(json!({"expression": ""}));
    assert!(envelope.is_failure());
}

#[test]
fn missing_expression_is_a_decode_error() {
    let error = corynth_plugin::codec::decode(b"{}", &calculate_spec())
        .expect_err("expression is required");
    assert_eq!(error.parameter(), Some("expression"));
}

#[test]
fn metadata_describes_the_calculator() {
    let value = serde_json::to_value(metadata()).expect("serialise");
    assert_eq!(value.get("name"), Some(&json!("calculator")));
    assert_eq!(value.get("version"), Some(&json!("1.0.0")));
}

#[test]
fn only_calculate_is_registered() {
    let runtime = runtime().expect("calculator builds");
    let names: Vec<&str> = runtime
        .registry()
        .list()
        .into_iter()
        .map(ActionSpec::name)
        .collect();
    assert_eq!(names, ["calculate"]);
}

#[rstest]
#[case(-1.0, 0)]
#[case(0.0, 0)]
#[case(2.0, 2)]
#[case(2.7, 2)]
#[case(99.0, MAX_PRECISION)]
fn precision_is_clamped(#[case] requested: f64, #[case] expected: u8) {
    assert_eq!(clamp_precision(requested), expected);
}

#[test]
fn unknown_action_uses_shared_envelope() {
    let runtime = runtime().expect("calculator builds");
    let envelope = runtime
        .registry()
        .dispatch(&(), "badaction", ParameterSet::new());
    assert_eq!(
        envelope.to_value(),
        json!({"error": "unknown action: badaction"})
    );
}
