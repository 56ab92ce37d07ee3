//! Handler-facing types: the invocation context and the handler result.
//!
//! Handlers signal failure in exactly one way, by returning
//! `Err(ActionError)`. The registry turns both arms of an [`ActionResult`]
//! into an [`Envelope`](crate::Envelope), so a handler never writes output
//! itself.

use serde_json::{Map, Value};

use crate::deadline::Deadline;
use crate::params::ParameterSet;

/// Result returned by every action handler.
pub type ActionResult = Result<Outcome, ActionError>;

/// Everything a handler needs for one invocation.
///
/// `S` is the plugin's process-wide state, such as a connection-pooled HTTP
/// client, built once at start-up and shared with every handler.
#[derive(Debug)]
pub struct ActionContext<'a, S> {
    state: &'a S,
    params: &'a ParameterSet,
    deadline: Option<Deadline>,
}

impl<'a, S> ActionContext<'a, S> {
    /// Creates a context for one handler call.
    #[must_use]
    pub const fn new(state: &'a S, params: &'a ParameterSet, deadline: Option<Deadline>) -> Self {
        Self {
            state,
            params,
            deadline,
        }
    }

    /// Returns the plugin state.
    #[must_use]
    pub const fn state(&self) -> &'a S {
        self.state
    }

    /// Returns the decoded parameters.
    #[must_use]
    pub const fn params(&self) -> &'a ParameterSet {
        self.params
    }

    /// Returns the deadline handlers should apply to collaborator calls.
    #[must_use]
    pub const fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }
}

/// Fields of a successful action result.
///
/// # Example
///
/// ```
/// use corynth_plugin::Outcome;
///
/// let outcome = Outcome::new().with("result", 8).with("expression", "2 + 2 * 3");
/// assert_eq!(outcome.get("result"), Some(&serde_json::json!(8)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    fields: Map<String, Value>,
}

impl Outcome {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the outcome, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for Outcome {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Failure reported by a handler.
///
/// Extra fields travel alongside the `error` message in the failure
/// envelope, for example `exit_code` or `status_code`.
///
/// # Example
///
/// ```
/// use corynth_plugin::ActionError;
///
/// let error = ActionError::new("division by zero").with("expression", "1 / 0");
/// assert_eq!(error.message(), "division by zero");
/// assert!(error.extra().contains_key("expression"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ActionError {
    message: String,
    extra: Map<String, Value>,
}

impl ActionError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Attaches an extra field.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Attaches every field of `outcome`, replacing fields of the same name.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.extra.extend(outcome.into_fields());
        self
    }

    /// Returns the error message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the extra fields.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Splits the error into its message and extra fields.
    #[must_use]
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.message, self.extra)
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionError {}
