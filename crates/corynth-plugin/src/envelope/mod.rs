//! The single response document written per invocation.
//!
//! The protocol is a one-shot JSON exchange over stdio. The orchestrator
//! writes the request body to the plugin's stdin and closes it. The plugin
//! writes one [`Envelope`] to stdout, terminated by a newline, and exits. A
//! top-level `error` string is the canonical failure signal; everything
//! else in the object is action-specific.

use std::io::Write;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::action::{ActionError, ActionResult, Outcome};
use crate::error::RuntimeError;

/// Name of the field that marks a failure envelope.
pub const ERROR_FIELD: &str = "error";

/// Response written to stdout for an execute request.
///
/// # Example
///
/// ```
/// use corynth_plugin::{Envelope, Outcome};
/// use serde_json::json;
///
/// let ok = Envelope::success(Outcome::new().with("result", 8));
/// assert!(!ok.is_failure());
///
/// let failed = Envelope::failure("unknown action: badaction");
/// assert_eq!(failed.to_value(), json!({"error": "unknown action: badaction"}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Wraps a handler's success fields unchanged.
    #[must_use]
    pub fn success(outcome: Outcome) -> Self {
        Self {
            fields: outcome.into_fields(),
        }
    }

    /// Creates `{"error": message}`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::failure_with(message, Map::new())
    }

    /// Creates `{"error": message, ...extra}`.
    ///
    /// The message always takes precedence over an `error` key in `extra`.
    #[must_use]
    pub fn failure_with(message: impl Into<String>, extra: Map<String, Value>) -> Self {
        let mut fields = extra;
        fields.insert(String::from(ERROR_FIELD), Value::String(message.into()));
        Self { fields }
    }

    /// Returns `true` when the envelope carries an `error` string.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.fields.get(ERROR_FIELD).and_then(Value::as_str)
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns all fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the envelope as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<ActionError> for Envelope {
    fn from(error: ActionError) -> Self {
        let (message, extra) = error.into_parts();
        Self::failure_with(message, extra)
    }
}

impl From<ActionResult> for Envelope {
    fn from(result: ActionResult) -> Self {
        match result {
            Ok(outcome) => Self::success(outcome),
            Err(error) => Self::from(error),
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Writes one document as a single JSON line and flushes.
///
/// This is the only function that writes to the protocol channel.
///
/// # Errors
///
/// Returns [`RuntimeError::Serialize`] if the document cannot be encoded and
/// [`RuntimeError::Write`] if the writer fails.
pub fn write_document<T: Serialize + ?Sized>(
    writer: &mut impl Write,
    document: &T,
) -> Result<(), RuntimeError> {
    let payload = serde_json::to_vec(document).map_err(RuntimeError::Serialize)?;
    writer
        .write_all(&payload)
        .map_err(|source| RuntimeError::Write {
            source: Arc::new(source),
        })?;
    writer.write_all(b"\n").map_err(|source| RuntimeError::Write {
        source: Arc::new(source),
    })?;
    writer.flush().map_err(|source| RuntimeError::Write {
        source: Arc::new(source),
    })
}
