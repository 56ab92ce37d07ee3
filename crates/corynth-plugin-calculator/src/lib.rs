//! Calculator plugin for Corynth workflows.
//!
//! Exposes a single `calculate` action that evaluates an arithmetic
//! expression with the [`expression`] module and rounds the result. The
//! evaluator is a closed grammar over numbers, so untrusted workflow input
//! can never reach an interpreter.

pub mod expression;

#[cfg(test)]
mod tests;

use corynth_plugin::{
    ActionContext, ActionError, ActionRegistry, ActionResult, ActionSpec, Metadata, Outcome,
    OutputSpec, ParamSpec, ParamType, PluginRuntime, RuntimeError,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::expression::evaluate;

/// Tracing target for calculator actions.
const CALCULATOR_TARGET: &str = "corynth_plugin_calculator";

/// Decimal places used when the request gives no `precision`.
pub const DEFAULT_PRECISION: u8 = 2;

/// Largest precision honoured; finer rounding is meaningless for `f64`.
pub const MAX_PRECISION: u8 = 15;

/// Returns the calculator's identity.
#[must_use]
pub fn metadata() -> Metadata {
    Metadata::new("calculator", "1.0.0")
        .with_description("Mathematical calculations with safe expression evaluation")
        .with_author("Corynth Team")
        .with_tags(["math", "calculation", "utility"])
}

/// Returns the `calculate` action declaration.
#[must_use]
pub fn calculate_spec() -> ActionSpec {
    ActionSpec::new("calculate", "Evaluate an arithmetic expression")
        .with_input(
            "expression",
            ParamSpec::required(
                ParamType::String,
                "Expression to evaluate (supports +, -, *, /, %, parentheses, pi, e)",
            ),
        )
        .with_input(
            "precision",
            ParamSpec::optional(ParamType::Number, "Decimal places in the result")
                .with_default(json!(DEFAULT_PRECISION)),
        )
        .with_output("result", OutputSpec::new(ParamType::Number, "Calculation result"))
        .with_output(
            "expression",
            OutputSpec::new(ParamType::String, "Original expression"),
        )
}

/// Builds the calculator's action table.
///
/// # Errors
///
/// Returns [`RuntimeError::Registry`] if the table is malformed.
pub fn runtime() -> Result<PluginRuntime<()>, RuntimeError> {
    let mut registry = ActionRegistry::new();
    registry.register(calculate_spec(), calculate)?;
    Ok(PluginRuntime::new(metadata(), registry, ()))
}

fn calculate(context: &ActionContext<'_, ()>) -> ActionResult {
    let params = context.params();
    let expression = params.require_str("expression")?;
    let precision = params
        .f64("precision")
        .map_or(DEFAULT_PRECISION, clamp_precision);

    let value = evaluate(expression).map_err(|error| {
        debug!(target: CALCULATOR_TARGET, expression, %error, "evaluation failed");
        ActionError::new(format!("invalid expression: {error}")).with("expression", expression)
    })?;

    Ok(Outcome::new()
        .with("result", to_json(round(value, precision)))
        .with("expression", expression))
}

/// Clamps a requested precision to `0..=MAX_PRECISION`, dropping any fraction.
#[must_use]
pub fn clamp_precision(requested: f64) -> u8 {
    (0..=MAX_PRECISION)
        .rev()
        .find(|digits| f64::from(*digits) <= requested)
        .unwrap_or(0)
}

/// Rounds `value` half away from zero to `digits` decimal places.
///
/// Values too large to scale are returned unchanged; they have no
/// fractional digits left to round.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "decimal rounding")]
pub fn round(value: f64, digits: u8) -> f64 {
    if digits == 0 {
        return value.round();
    }
    let scale = 10_f64.powi(i32::from(digits));
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Largest magnitude at which every integer is exactly representable.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Converts a result to JSON, emitting integral values as integers.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "only integral values inside the exact-integer range are cast"
)]
pub fn to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
