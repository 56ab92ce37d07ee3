//! Decoded request parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::action::ActionError;

/// Name of the parameter from which handler deadlines are derived.
pub const TIMEOUT_PARAMETER: &str = "timeout";

/// Runtime view of a request after decoding.
///
/// Declared parameters are guaranteed to carry their declared type, or to be
/// absent when optional with no default. Undeclared keys are passed through
/// untouched, so the typed accessors return `None` rather than failing when a
/// value is missing or has an unexpected type.
///
/// # Example
///
/// ```
/// use corynth_plugin::ParameterSet;
/// use serde_json::json;
///
/// let params = ParameterSet::try_from(json!({"url": "https://example.com", "timeout": 5}))
///     .expect("object");
/// assert_eq!(params.str("url"), Some("https://example.com"));
/// assert_eq!(params.timeout().map(|d| d.as_secs()), Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: Map<String, Value>,
}

impl ParameterSet {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` when `name` carries a non-null value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    /// Returns a string parameter.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a numeric parameter as a float.
    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Returns a boolean parameter.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Returns an object parameter.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    /// Returns an array parameter.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Returns the string-valued entries of an object parameter.
    ///
    /// Entries whose values are not strings are skipped, matching how
    /// headers and environment maps are forwarded to collaborators.
    #[must_use]
    pub fn string_map(&self, name: &str) -> BTreeMap<String, String> {
        self.object(name)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|text| (key.clone(), text.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a string parameter that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] naming the parameter when it is absent,
    /// not a string, or blank.
    pub fn require_str(&self, name: &str) -> Result<&str, ActionError> {
        match self.str(name) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(ActionError::new(format!(
                "parameter '{name}' must not be empty"
            ))),
            None => Err(ActionError::new(format!(
                "parameter '{name}' must be a string"
            ))),
        }
    }

    /// Returns the duration requested through the `timeout` parameter.
    ///
    /// The value is read in seconds. Zero, negative, and non-finite values
    /// mean no deadline.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.f64(TIMEOUT_PARAMETER)
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no parameters are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all parameters, declared and pass-through.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for ParameterSet {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl TryFrom<Value> for ParameterSet {
    type Error = Value;

    /// Wraps a JSON object, returning the value unchanged if it is not one.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(other),
        }
    }
}
