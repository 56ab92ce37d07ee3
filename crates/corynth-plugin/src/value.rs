//! Semantic type tags for parameter values.
//!
//! Request values are carried as [`serde_json::Value`], which is already a
//! tagged union. [`ValueKind`] names the observed variant of a value and
//! [`ParamType`] names the variant an action declares for a parameter, so
//! the codec's type check is a plain match between the two.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an action parameter.
///
/// # Example
///
/// ```
/// use corynth_plugin::ParamType;
/// use serde_json::json;
///
/// assert!(ParamType::Number.accepts(&json!(4.5)));
/// assert!(!ParamType::String.accepts(&json!(42)));
/// assert_eq!(ParamType::Boolean.to_string(), "boolean");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// Any JSON number, integral or not.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl ParamType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Returns `true` when `value` is of this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        self.matches(ValueKind::of(value))
    }

    /// Returns `true` when a value of `kind` satisfies this type.
    #[must_use]
    pub const fn matches(self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (Self::String, ValueKind::String)
                | (Self::Number, ValueKind::Number)
                | (Self::Boolean, ValueKind::Boolean)
                | (Self::Object, ValueKind::Object)
                | (Self::Array, ValueKind::Array)
        )
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed JSON type of a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// JSON `null`.
    Null,
    /// JSON `true` or `false`.
    Boolean,
    /// A JSON number.
    Number,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ValueKind {
    /// Classifies a JSON value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
