//! HTTP collaborator behind the `get` and `post` actions.
//!
//! Handlers describe a request as an [`HttpRequest`] and hand it to an
//! [`HttpTransport`]. The production transport wraps a blocking `reqwest`
//! client; tests substitute a mock.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use corynth_plugin::ActionError;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Tracing target for transport activity.
const TRANSPORT_TARGET: &str = "corynth_plugin_http::transport";

/// Media type that marks a response body as JSON.
const JSON_MEDIA_TYPE: &str = "application/json";

/// Request methods the plugin issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Returns the method's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Username and password for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Pairs a username with its password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub const fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the password.
    #[must_use]
    pub const fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A request ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    basic_auth: Option<BasicAuth>,
}

impl HttpRequest {
    /// Creates a request with no headers, body, or credentials.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            basic_auth: None,
        }
    }

    /// Sets a header, replacing any value already set under the same name.
    ///
    /// Header names compare case-insensitively.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let header = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&header));
        self.headers.push((header, value.into()));
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, auth: BasicAuth) -> Self {
        self.basic_auth = Some(auth);
        self
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Returns the target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the headers in the order they were set.
    #[must_use]
    pub const fn headers(&self) -> &[(String, String)] {
        self.headers.as_slice()
    }

    /// Looks up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body, if one was set.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns the basic-auth credentials, if any.
    #[must_use]
    pub const fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }
}

/// A received response with its body read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl HttpResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Records a header unless one with the same name is already present.
    ///
    /// Only the first value of a repeated header is kept.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let header = name.into();
        if self.header(&header).is_none() {
            self.headers.insert(header, value.into());
        }
        self
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the first value of each response header.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Looks up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body text.
    #[must_use]
    pub const fn body(&self) -> &str {
        self.body.as_str()
    }

    /// Returns `true` for 4xx and 5xx statuses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Parses the body when the response declares itself as JSON.
    ///
    /// Returns `None` for other content types, an empty body, or a body that
    /// does not parse.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        let declared = self
            .header("content-type")
            .is_some_and(|content_type| content_type.contains(JSON_MEDIA_TYPE));
        if !declared || self.body.is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

/// Failures talking to a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The `url` parameter did not parse.
    #[error("invalid url '{url}': {message}")]
    InvalidUrl {
        /// Text that was supplied.
        url: String,
        /// Parser error text.
        message: String,
    },

    /// The URL uses a scheme other than `http` or `https`.
    #[error("unsupported url scheme '{scheme}'")]
    UnsupportedScheme {
        /// Rejected scheme.
        scheme: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    Client {
        /// Underlying error text.
        message: String,
    },

    /// The request could not be sent or no response arrived.
    #[error("request failed: {message}")]
    Request {
        /// Underlying error text.
        message: String,
    },

    /// The deadline passed before the response completed.
    #[error("request failed: {url} did not respond within the timeout")]
    TimedOut {
        /// Target of the request.
        url: String,
    },

    /// The response body could not be read.
    #[error("failed to read response: {message}")]
    Body {
        /// Underlying error text.
        message: String,
    },
}

impl From<HttpError> for ActionError {
    fn from(error: HttpError) -> Self {
        let message = error.to_string();
        match error {
            HttpError::InvalidUrl { url, .. } | HttpError::TimedOut { url } => {
                Self::new(message).with("url", url)
            }
            HttpError::UnsupportedScheme { .. }
            | HttpError::Client { .. }
            | HttpError::Request { .. }
            | HttpError::Body { .. } => Self::new(message),
        }
    }
}

/// Parses a request URL, accepting only `http` and `https`.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUrl`] when the text does not parse and
/// [`HttpError::UnsupportedScheme`] for any other scheme.
pub fn parse_url(text: &str) -> Result<Url, HttpError> {
    let url = Url::parse(text.trim()).map_err(|error| HttpError::InvalidUrl {
        url: text.to_owned(),
        message: error.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::UnsupportedScheme {
            scheme: other.to_owned(),
        }),
    }
}

/// Sends requests on behalf of the plugin's actions.
pub trait HttpTransport {
    /// Sends `request`, giving up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] when no complete response was received.
    /// Error statuses are responses, not errors.
    fn send(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpError>;
}

/// Transport backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a client that identifies itself as `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Client`] if the TLS backend or client cannot be
    /// initialised.
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|error| HttpError::Client {
                message: describe(&error),
            })?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpError> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = request.basic_auth() {
            builder = builder.basic_auth(auth.username(), Some(auth.password()));
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }
        if let Some(limit) = timeout {
            builder = builder.timeout(limit);
        }

        let response = builder
            .send()
            .map_err(|error| request_failure(request.url(), &error))?;
        let status = response.status().as_u16();
        let mut received = HttpResponse::new(status, String::new());
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                received = received.with_header(name.as_str(), text);
            }
        }
        let body = response.text().map_err(|error| {
            if error.is_timeout() {
                HttpError::TimedOut {
                    url: request.url().to_string(),
                }
            } else {
                HttpError::Body {
                    message: describe(&error),
                }
            }
        })?;
        debug!(
            target: TRANSPORT_TARGET,
            method = request.method().as_str(),
            url = %request.url(),
            status,
            body_bytes = body.len(),
            "received response"
        );
        received.body = body;
        Ok(received)
    }
}

fn request_failure(url: &Url, error: &reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::TimedOut {
            url: url.to_string(),
        }
    } else {
        HttpError::Request {
            message: describe(error),
        }
    }
}

/// Flattens an error and its sources into one line.
fn describe(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
