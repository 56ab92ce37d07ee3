//! Domain errors raised by the plugin core.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. Only [`RuntimeError`] affects the
//! process exit code; every other error is rendered into a failure envelope
//! and the exchange still completes. I/O errors are wrapped in `Arc` to
//! satisfy the `result_large_err` Clippy lint.

use std::sync::Arc;

use thiserror::Error;

use crate::value::{ParamType, ValueKind};

/// Errors raised while decoding a request body against an action spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The body was not a JSON object.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Parser or shape error text.
        message: String,
    },

    /// A required parameter was absent or `null`.
    #[error("missing required parameter '{name}'")]
    MissingParameter {
        /// Declared parameter name.
        name: String,
    },

    /// A parameter was present with the wrong JSON type.
    #[error("parameter '{name}' must be of type {expected}, got {actual}")]
    TypeMismatch {
        /// Declared parameter name.
        name: String,
        /// Type declared by the action.
        expected: ParamType,
        /// Type observed in the request.
        actual: ValueKind,
    },
}

impl DecodeError {
    /// Returns the offending parameter name, if the error concerns one.
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { .. } => None,
            Self::MissingParameter { name } | Self::TypeMismatch { name, .. } => {
                Some(name.as_str())
            }
        }
    }
}

/// Errors raised while routing a request to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No action with this name is registered.
    #[error("unknown action: {name}")]
    UnknownAction {
        /// Requested action name.
        name: String,
    },
}

/// Errors raised while building an action registry.
///
/// These indicate programming mistakes in a plugin and surface at start-up,
/// never in response to a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two actions share a name.
    #[error("action '{name}' is already registered")]
    DuplicateAction {
        /// Colliding action name.
        name: String,
    },

    /// An action declaration is malformed.
    #[error("invalid action '{action}': {message}")]
    InvalidSpec {
        /// Action being registered.
        action: String,
        /// Description of the problem.
        message: String,
    },
}

/// Process-level faults that prevent a normal protocol exchange.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No mode or action argument was supplied.
    #[error("action required")]
    MissingMode,

    /// The command line could not be interpreted.
    #[error("invalid invocation: {message}")]
    InvalidInvocation {
        /// Parser error text.
        message: String,
    },

    /// The action table could not be assembled.
    #[error("failed to register actions: {0}")]
    Registry(#[from] RegistryError),

    /// Plugin state could not be constructed.
    #[error("failed to initialise plugin: {message}")]
    Build {
        /// Human-readable failure description.
        message: String,
    },

    /// The response document could not be serialised.
    #[error("failed to serialise plugin output: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing to stdout failed.
    #[error("failed to write plugin output: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl RuntimeError {
    /// Returns `true` when the fault can still be reported on stdout.
    ///
    /// A failed write cannot be reported through the channel that failed.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::Write { .. } | Self::Serialize(_))
    }
}
