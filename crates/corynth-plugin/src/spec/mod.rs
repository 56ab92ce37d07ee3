//! Static descriptions of a plugin's identity and actions.
//!
//! [`Metadata`] is what the `metadata` mode prints. [`ActionSpec`] describes
//! one verb, its typed inputs ([`ParamSpec`]) and its documented outputs
//! ([`OutputSpec`]); the table of all specs is what the `actions` mode
//! prints. Specs are built once at start-up and validated on registration
//! so malformed declarations fail before any request is served.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::RegistryError;
use crate::value::{ParamType, ValueKind};

/// Plugin identity returned verbatim by the `metadata` mode.
///
/// # Example
///
/// ```
/// use corynth_plugin::Metadata;
///
/// let metadata = Metadata::new("calculator", "1.0.0")
///     .with_description("Safe arithmetic")
///     .with_author("Corynth Team")
///     .with_tags(["math", "utility", "math"]);
/// assert_eq!(metadata.tags(), ["math", "utility"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<String>,
}

impl Metadata {
    /// Creates metadata with the given name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            tags: Vec::new(),
            license: None,
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Appends tags, skipping any already present.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Sets the license identifier.
    #[must_use]
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    /// Returns the plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the author.
    #[must_use]
    pub const fn author(&self) -> &str {
        self.author.as_str()
    }

    /// Returns the tags in declaration order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the license, if declared.
    #[must_use]
    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }
}

/// Declaration of one action input.
///
/// Serialises as `{type, required, default?, description}`.
///
/// # Example
///
/// ```
/// use corynth_plugin::{ParamSpec, ParamType};
/// use serde_json::json;
///
/// let timeout = ParamSpec::optional(ParamType::Number, "Timeout in seconds")
///     .with_default(json!(30));
/// assert!(!timeout.is_required());
/// assert_eq!(timeout.default_value(), Some(&json!(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    param_type: ParamType,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    description: String,
}

impl ParamSpec {
    /// Declares a parameter that must be present in every request.
    #[must_use]
    pub fn required(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            required: true,
            default: None,
            description: description.into(),
        }
    }

    /// Declares a parameter that may be omitted.
    #[must_use]
    pub fn optional(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            required: false,
            default: None,
            description: description.into(),
        }
    }

    /// Sets the value substituted when the parameter is omitted.
    ///
    /// A `null` default is the same as no default.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = if value.is_null() { None } else { Some(value) };
        self
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn param_type(&self) -> ParamType {
        self.param_type
    }

    /// Returns whether the parameter is mandatory.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value, if any.
    #[must_use]
    pub const fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    fn validate(&self, action: &str, name: &str) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec {
                action: action.to_owned(),
                message: String::from("parameter names must not be empty"),
            });
        }
        let Some(default) = self.default.as_ref() else {
            return Ok(());
        };
        if self.required {
            return Err(RegistryError::InvalidSpec {
                action: action.to_owned(),
                message: format!("required parameter '{name}' must not declare a default"),
            });
        }
        if !self.param_type.accepts(default) {
            return Err(RegistryError::InvalidSpec {
                action: action.to_owned(),
                message: format!(
                    "default for '{name}' must be of type {}, got {}",
                    self.param_type,
                    ValueKind::of(default)
                ),
            });
        }
        Ok(())
    }
}

/// Documentation for one result field.
///
/// Serialises as `{type, description}`. Outputs are never enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    param_type: ParamType,
    description: String,
}

impl OutputSpec {
    /// Creates an output description.
    #[must_use]
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
        }
    }

    /// Returns the documented type.
    #[must_use]
    pub const fn param_type(&self) -> ParamType {
        self.param_type
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }
}

/// Static description of one action.
///
/// Inputs keep their declaration order: the codec validates them in that
/// order and the `actions` mode prints them in that order.
///
/// # Example
///
/// ```
/// use corynth_plugin::{ActionSpec, OutputSpec, ParamSpec, ParamType};
///
/// let spec = ActionSpec::new("calculate", "Evaluate an expression")
///     .with_input(
///         "expression",
///         ParamSpec::required(ParamType::String, "Expression to evaluate"),
///     )
///     .with_output("result", OutputSpec::new(ParamType::Number, "Result"));
/// assert_eq!(spec.name(), "calculate");
/// assert!(spec.input("expression").is_some_and(|p| p.is_required()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    #[serde(skip)]
    name: String,
    description: String,
    #[serde(serialize_with = "serialize_inputs")]
    inputs: Vec<(String, ParamSpec)>,
    #[serde(serialize_with = "serialize_outputs")]
    outputs: Vec<(String, OutputSpec)>,
}

impl ActionSpec {
    /// Creates an action with no inputs or outputs.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends an input parameter.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.inputs.push((name.into(), spec));
        self
    }

    /// Appends a documented output field.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, spec: OutputSpec) -> Self {
        self.outputs.push((name.into(), spec));
        self
    }

    /// Returns the action name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the inputs in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.inputs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Returns the outputs in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &OutputSpec)> {
        self.outputs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Looks up an input by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&ParamSpec> {
        self.inputs
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, spec)| spec)
    }

    /// Validates the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidSpec`] if the action name is empty,
    /// an input name is empty or repeated, or a default contradicts its
    /// parameter declaration.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec {
                action: self.name.clone(),
                message: String::from("action name must not be empty"),
            });
        }
        for (index, (name, spec)) in self.inputs.iter().enumerate() {
            spec.validate(&self.name, name)?;
            let repeated = self
                .inputs
                .iter()
                .skip(index + 1)
                .any(|(other, _)| other == name);
            if repeated {
                return Err(RegistryError::InvalidSpec {
                    action: self.name.clone(),
                    message: format!("parameter '{name}' is declared more than once"),
                });
            }
        }
        Ok(())
    }
}

fn serialize_inputs<S: Serializer>(
    entries: &[(String, ParamSpec)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(name, spec)| (name, spec)))
}

fn serialize_outputs<S: Serializer>(
    entries: &[(String, OutputSpec)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(name, spec)| (name, spec)))
}
