//! Action registry for spec storage, discovery, and dispatch.
//!
//! The [`ActionRegistry`] stores validated action specs with their handlers
//! in insertion order and routes an action name to its handler. Duplicate
//! registrations are rejected. Dispatch never fails: unknown actions,
//! handler errors, and handler panics all become failure envelopes.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::action::{ActionContext, ActionResult};
use crate::deadline::Deadline;
use crate::envelope::Envelope;
use crate::error::{DispatchError, RegistryError};
use crate::params::ParameterSet;
use crate::spec::ActionSpec;

/// Tracing target for dispatch operations.
const REGISTRY_TARGET: &str = "corynth_plugin::registry";

/// Boxed action handler.
pub type Handler<S> = Box<dyn Fn(&ActionContext<'_, S>) -> ActionResult>;

struct Entry<S> {
    spec: ActionSpec,
    handler: Handler<S>,
}

/// Static action table of one plugin.
///
/// # Example
///
/// ```
/// use corynth_plugin::{
///     ActionContext, ActionRegistry, ActionResult, ActionSpec, Outcome, ParameterSet,
/// };
///
/// fn ping(_context: &ActionContext<'_, ()>) -> ActionResult {
///     Ok(Outcome::new().with("pong", true))
/// }
///
/// let mut registry = ActionRegistry::new();
/// registry
///     .register(ActionSpec::new("ping", "Liveness probe"), ping)
///     .expect("registration succeeds");
///
/// let envelope = registry.dispatch(&(), "ping", ParameterSet::new());
/// assert!(!envelope.is_failure());
/// ```
pub struct ActionRegistry<S> {
    entries: Vec<Entry<S>>,
    index: HashMap<String, usize>,
}

impl<S> Default for ActionRegistry<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<S> std::fmt::Debug for ActionRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.index.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> ActionRegistry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action after validating its spec.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidSpec`] if the spec is malformed and
    /// [`RegistryError::DuplicateAction`] if the name is already taken.
    pub fn register<H>(&mut self, spec: ActionSpec, handler: H) -> Result<(), RegistryError>
    where
        H: Fn(&ActionContext<'_, S>) -> ActionResult + 'static,
    {
        spec.validate()?;
        let name = spec.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateAction { name });
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry {
            spec,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Looks up an action spec by name.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ActionSpec> {
        self.entry(name).map(|entry| &entry.spec)
    }

    /// Returns `true` when an action with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns all specs in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<&ActionSpec> {
        self.entries.iter().map(|entry| &entry.spec).collect()
    }

    /// Returns the discovery document printed by the `actions` mode.
    #[must_use]
    pub const fn table(&self) -> ActionTable<'_, S> {
        ActionTable { registry: self }
    }

    /// Returns the number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the named action with no fallback deadline.
    #[must_use]
    pub fn dispatch(&self, state: &S, name: &str, params: ParameterSet) -> Envelope {
        self.dispatch_within(state, name, params, None)
    }

    /// Runs the named action.
    ///
    /// The handler's deadline comes from the `timeout` parameter, or from
    /// `fallback_timeout` when the request carries none.
    #[must_use]
    pub fn dispatch_within(
        &self,
        state: &S,
        name: &str,
        params: ParameterSet,
        fallback_timeout: Option<Duration>,
    ) -> Envelope {
        let Some(entry) = self.entry(name) else {
            debug!(target: REGISTRY_TARGET, action = name, "unknown action requested");
            return Envelope::failure(
                DispatchError::UnknownAction {
                    name: name.to_owned(),
                }
                .to_string(),
            );
        };

        let deadline = params.timeout().or(fallback_timeout).map(Deadline::after);
        let context = ActionContext::new(state, &params, deadline);

        debug!(
            target: REGISTRY_TARGET,
            action = name,
            parameters = params.len(),
            deadline_ms = deadline.map(|d| u64::try_from(d.budget().as_millis()).unwrap_or(u64::MAX)),
            "dispatching action"
        );

        match panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(&context))) {
            Ok(result) => {
                if let Err(error) = &result {
                    debug!(
                        target: REGISTRY_TARGET,
                        action = name,
                        error = error.message(),
                        "action reported failure"
                    );
                }
                Envelope::from(result)
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                warn!(
                    target: REGISTRY_TARGET,
                    action = name,
                    panic = %detail,
                    "action handler panicked"
                );
                Envelope::failure(format!("action '{name}' failed unexpectedly: {detail}"))
            }
        }
    }

    fn entry(&self, name: &str) -> Option<&Entry<S>> {
        self.index
            .get(name)
            .and_then(|position| self.entries.get(*position))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    String::from("handler panicked")
}

/// Serialisable view of the action table, keyed by name in insertion order.
pub struct ActionTable<'a, S> {
    registry: &'a ActionRegistry<S>,
}

impl<S> Serialize for ActionTable<'_, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        serializer.collect_map(
            self.registry
                .entries
                .iter()
                .map(|entry| (entry.spec.name(), &entry.spec)),
        )
    }
}
