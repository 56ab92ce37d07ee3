//! HTTP plugin for Corynth workflows.
//!
//! `get` and `post` issue a single request through an [`HttpTransport`] and
//! report the response's status, headers, body text, and parsed JSON when
//! the server declares it. Responses with a 4xx or 5xx status fail the step
//! but still carry what the server sent.

pub mod settings;
pub mod transport;

#[cfg(test)]
mod tests;

use corynth_plugin::{
    ActionContext, ActionError, ActionRegistry, ActionResult, ActionSpec, Deadline, Metadata,
    Outcome, OutputSpec, ParamSpec, ParamType, ParameterSet, PluginRuntime, RuntimeError,
};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub use self::settings::HttpSettings;
pub use self::transport::{
    BasicAuth, HttpError, HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport,
};

/// Tracing target for HTTP actions.
const HTTP_TARGET: &str = "corynth_plugin_http";

/// Name the settings loader reports as the program.
const PROGRAM: &str = "corynth-plugin-http";

/// Seconds allowed for a request when the request sets no `timeout`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `Content-Type` used by `post` when the request names none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Transport and settings shared by every action in one invocation.
#[derive(Debug)]
pub struct HttpState<T> {
    transport: T,
    settings: HttpSettings,
}

impl<T> HttpState<T> {
    /// Pairs a transport with the settings it should honour.
    #[must_use]
    pub const fn new(transport: T, settings: HttpSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &HttpSettings {
        &self.settings
    }
}

/// Returns the HTTP plugin's identity.
#[must_use]
pub fn metadata() -> Metadata {
    Metadata::new("http", "1.0.0")
        .with_description("HTTP client for REST API calls and web requests")
        .with_author("Corynth Team")
        .with_tags(["http", "web", "api", "rest"])
}

fn with_request_inputs(spec: ActionSpec) -> ActionSpec {
    spec.with_input("url", ParamSpec::required(ParamType::String, "Request URL"))
        .with_input(
            "headers",
            ParamSpec::optional(ParamType::Object, "HTTP headers"),
        )
        .with_input(
            "timeout",
            ParamSpec::optional(ParamType::Number, "Request timeout in seconds")
                .with_default(json!(DEFAULT_TIMEOUT_SECS)),
        )
        .with_input(
            "auth",
            ParamSpec::optional(ParamType::Object, "Basic auth with username/password"),
        )
}

fn with_response_outputs(spec: ActionSpec) -> ActionSpec {
    spec.with_output(
        "status_code",
        OutputSpec::new(ParamType::Number, "HTTP status code"),
    )
    .with_output("headers", OutputSpec::new(ParamType::Object, "Response headers"))
    .with_output("content", OutputSpec::new(ParamType::String, "Response body"))
    .with_output(
        "json",
        OutputSpec::new(ParamType::Object, "Parsed JSON response (if applicable)"),
    )
}

/// Returns the `get` action declaration.
#[must_use]
pub fn get_spec() -> ActionSpec {
    let base = ActionSpec::new("get", "Make HTTP GET requests with headers");
    with_response_outputs(with_request_inputs(base))
}

/// Returns the `post` action declaration.
#[must_use]
pub fn post_spec() -> ActionSpec {
    let base = ActionSpec::new("post", "Make HTTP POST requests with JSON data");
    let spec = with_request_inputs(base)
        .with_input(
            "body",
            ParamSpec::optional(ParamType::String, "Request body as string"),
        )
        .with_input(
            "json",
            ParamSpec::optional(ParamType::Object, "Request body as JSON"),
        )
        .with_input(
            "content_type",
            ParamSpec::optional(ParamType::String, "Content-Type header")
                .with_default(json!(DEFAULT_CONTENT_TYPE)),
        );
    with_response_outputs(spec)
}

/// Builds the HTTP plugin's runtime with a `reqwest` transport.
///
/// Settings that fail to load are reported and replaced by defaults.
///
/// # Errors
///
/// Returns [`RuntimeError::Build`] if the HTTP client cannot be created
/// and [`RuntimeError::Registry`] if the action table is malformed.
pub fn runtime() -> Result<PluginRuntime<HttpState<ReqwestTransport>>, RuntimeError> {
    let settings = HttpSettings::load_for(PROGRAM).unwrap_or_else(|error| {
        warn!(target: HTTP_TARGET, %error, "ignoring unreadable HTTP settings");
        HttpSettings::default()
    });
    let transport =
        ReqwestTransport::new(settings.user_agent()).map_err(|error| RuntimeError::Build {
            message: error.to_string(),
        })?;
    runtime_with(HttpState::new(transport, settings))
}

/// Builds the HTTP plugin's runtime around any transport.
///
/// # Errors
///
/// Returns [`RuntimeError::Registry`] if the action table is malformed.
pub fn runtime_with<T>(state: HttpState<T>) -> Result<PluginRuntime<HttpState<T>>, RuntimeError>
where
    T: HttpTransport + 'static,
{
    let mut registry = ActionRegistry::new();
    registry.register(get_spec(), get::<T>)?;
    registry.register(post_spec(), post::<T>)?;
    Ok(PluginRuntime::new(metadata(), registry, state))
}

fn get<T: HttpTransport>(context: &ActionContext<'_, HttpState<T>>) -> ActionResult {
    let request = prepare(Method::Get, context.params(), context.state().settings())?;
    send(context, &request)
}

fn post<T: HttpTransport>(context: &ActionContext<'_, HttpState<T>>) -> ActionResult {
    let request = prepare(Method::Post, context.params(), context.state().settings())?;
    send(context, &request)
}

/// Translates action parameters into a request.
///
/// For `post`, the `content_type` header is set before user headers so a
/// `Content-Type` entry in `headers` overrides it. A `json` body wins over
/// `body`. Settings supply a bearer token only when the request carries no
/// credentials of its own.
fn prepare(
    method: Method,
    params: &ParameterSet,
    settings: &HttpSettings,
) -> Result<HttpRequest, ActionError> {
    let url = transport::parse_url(params.require_str("url")?)?;
    let mut request = HttpRequest::new(method, url);

    if method == Method::Post {
        let content_type = params
            .str("content_type")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        request = request.with_header("Content-Type", content_type);
        if let Some(document) = params.get("json") {
            let encoded = serde_json::to_vec(document).map_err(|error| {
                ActionError::new(format!("failed to encode JSON body: {error}"))
            })?;
            request = request.with_body(encoded);
        } else if let Some(text) = params.str("body") {
            request = request.with_body(text);
        }
    }

    for (name, value) in params.string_map("headers") {
        request = request.with_header(name, value);
    }

    match (basic_auth(params), settings.token()) {
        (Some(auth), _) => Ok(request.with_basic_auth(auth)),
        (None, Some(token)) if request.header("authorization").is_none() => {
            Ok(request.with_header("Authorization", format!("Bearer {token}")))
        }
        _ => Ok(request),
    }
}

/// Reads `auth.username` and `auth.password`; both must be strings.
fn basic_auth(params: &ParameterSet) -> Option<BasicAuth> {
    let auth = params.object("auth")?;
    let username = auth.get("username").and_then(Value::as_str)?;
    let password = auth.get("password").and_then(Value::as_str)?;
    Some(BasicAuth::new(username, password))
}

fn send<T: HttpTransport>(
    context: &ActionContext<'_, HttpState<T>>,
    request: &HttpRequest,
) -> ActionResult {
    let timeout = context.deadline().as_ref().map(Deadline::remaining);
    debug!(
        target: HTTP_TARGET,
        method = request.method().as_str(),
        url = %request.url(),
        ?timeout,
        "sending request"
    );
    let response = context.state().transport().send(request, timeout)?;
    let outcome = response_outcome(&response);
    if response.is_error() {
        debug!(target: HTTP_TARGET, status = response.status(), "error status");
        let error = ActionError::new(format!("request returned HTTP {}", response.status()));
        return Err(error.with_outcome(outcome));
    }
    Ok(outcome)
}

/// Renders a response as the action's output fields.
fn response_outcome(response: &HttpResponse) -> Outcome {
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
        .collect();
    let mut outcome = Outcome::new()
        .with("status_code", response.status())
        .with("headers", headers)
        .with("content", response.body());
    if let Some(document) = response.json() {
        outcome.insert("json", document);
    }
    outcome
}
