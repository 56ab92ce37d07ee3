//! Execution protocol shared by Corynth workflow plugins.
//!
//! A Corynth plugin is a short-lived executable. The orchestrator starts it
//! once per workflow step with a mode argument, writes a JSON request to its
//! stdin, and reads exactly one JSON document from its stdout. This crate
//! implements everything about that exchange that is not specific to one
//! plugin:
//!
//! - the [`codec`], which decodes a request body against an action's
//!   declared inputs, applying defaults and reporting type mismatches;
//! - the [`ActionRegistry`], which maps action names to specs and handlers
//!   and supports discovery and dispatch;
//! - the [`PluginRuntime`] and [`launch`], which implement the
//!   `metadata` / `actions` / execute modes and the exit-code contract;
//! - the [`Envelope`], the single success or failure document per call;
//! - the [`command`] collaborator, used by plugins that wrap a CLI.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::process::ExitCode;
//!
//! use corynth_plugin::{
//!     ActionContext, ActionRegistry, ActionResult, ActionSpec, Metadata, Outcome, ParamSpec,
//!     ParamType, PluginRuntime,
//! };
//!
//! fn shout(context: &ActionContext<'_, ()>) -> ActionResult {
//!     let text = context.params().require_str("text")?;
//!     Ok(Outcome::new().with("text", text.to_uppercase()))
//! }
//!
//! fn main() -> ExitCode {
//!     corynth_plugin::launch(|_config| {
//!         let mut registry = ActionRegistry::new();
//!         registry.register(
//!             ActionSpec::new("shout", "Upper-case some text")
//!                 .with_input("text", ParamSpec::required(ParamType::String, "Input")),
//!             shout,
//!         )?;
//!         Ok(PluginRuntime::new(Metadata::new("shout", "0.1.0"), registry, ()))
//!     })
//! }
//! ```

pub mod action;
pub mod codec;
pub mod command;
pub mod config;
pub mod deadline;
pub mod envelope;
pub mod error;
pub mod params;
pub mod registry;
pub mod runtime;
pub mod spec;
pub mod telemetry;
pub mod value;

#[cfg(test)]
mod tests;

pub use self::action::{ActionContext, ActionError, ActionResult, Outcome};
pub use self::config::{LogFormat, PluginConfig};
pub use self::deadline::Deadline;
pub use self::envelope::Envelope;
pub use self::error::{DecodeError, DispatchError, RegistryError, RuntimeError};
pub use self::params::ParameterSet;
pub use self::registry::ActionRegistry;
pub use self::runtime::{PluginRuntime, launch};
pub use self::spec::{ActionSpec, Metadata, OutputSpec, ParamSpec};
pub use self::value::{ParamType, ValueKind};
