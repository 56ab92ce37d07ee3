//! Request decoding against an action's declared inputs.
//!
//! [`decode`] is total: every byte string either becomes a [`ParameterSet`]
//! satisfying the action's inputs or fails with exactly one [`DecodeError`]. Inputs are
//! checked in declaration order and the first failure wins, so a malformed
//! request always reports the same parameter.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::params::ParameterSet;
use crate::spec::ActionSpec;
use crate::value::ValueKind;

/// Decodes a raw request body for `spec`.
///
/// Empty or whitespace-only input is treated as `{}`. A `null` value counts
/// as absent. Undeclared keys are kept as they are.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidInput`] when the body is not a JSON object,
/// [`DecodeError::MissingParameter`] when a required input is absent, and
/// [`DecodeError::TypeMismatch`] when an input has the wrong JSON type.
///
/// # Example
///
/// ```
/// use corynth_plugin::{ActionSpec, ParamSpec, ParamType, codec};
/// use serde_json::json;
///
/// let spec = ActionSpec::new("get", "Fetch")
///     .with_input("url", ParamSpec::required(ParamType::String, "URL"))
///     .with_input(
///         "timeout",
///         ParamSpec::optional(ParamType::Number, "Seconds").with_default(json!(30)),
///     );
///
/// let params = codec::decode(br#"{"url": "https://example.com"}"#, &spec)
///     .expect("valid request");
/// assert_eq!(params.f64("timeout"), Some(30.0));
/// ```
pub fn decode(raw: &[u8], spec: &ActionSpec) -> Result<ParameterSet, DecodeError> {
    let mut values = parse_object(raw)?;

    for (name, param) in spec.inputs() {
        let present = values.get(name).filter(|value| !value.is_null());
        match present {
            Some(value) if !param.param_type().accepts(value) => {
                return Err(DecodeError::TypeMismatch {
                    name: name.to_owned(),
                    expected: param.param_type(),
                    actual: ValueKind::of(value),
                });
            }
            Some(_) => {}
            None if param.is_required() => {
                return Err(DecodeError::MissingParameter {
                    name: name.to_owned(),
                });
            }
            None => match param.default_value() {
                Some(default) => {
                    values.insert(name.to_owned(), default.clone());
                }
                None => {
                    drop(values.remove(name));
                }
            },
        }
    }

    Ok(ParameterSet::from(values))
}

/// Parses a body into a JSON object without applying any spec.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidInput`] when the body is not a JSON object.
pub fn parse_object(raw: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    let value: Value =
        serde_json::from_slice(trimmed).map_err(|error| DecodeError::InvalidInput {
            message: error.to_string(),
        })?;

    match value {
        Value::Object(values) => Ok(values),
        other => Err(DecodeError::InvalidInput {
            message: format!("expected a JSON object, got {}", ValueKind::of(&other)),
        }),
    }
}
