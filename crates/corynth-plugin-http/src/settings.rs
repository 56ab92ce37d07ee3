//! Settings injected into the HTTP plugin at start-up.
//!
//! Loaded with `ortho_config` from defaults, an optional configuration file,
//! and `CORYNTH_HTTP_*` environment variables. Requests never override these
//! values; they only fill gaps a request leaves open.

use std::fmt;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

/// User agent sent when none is configured.
#[must_use]
pub fn default_user_agent() -> String {
    format!("corynth-plugin-http/{}", env!("CARGO_PKG_VERSION"))
}

/// Process-wide HTTP settings.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CORYNTH_HTTP")]
pub struct HttpSettings {
    /// Bearer token for requests that carry no credentials of their own.
    #[serde(default)]
    pub token: Option<String>,
    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            token: None,
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl HttpSettings {
    /// Loads settings from files and the environment only.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when a layer is malformed.
    pub fn load_for(program: &str) -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([program])
    }

    /// Returns the bearer token, ignoring a blank value.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Returns the user agent.
    #[must_use]
    pub const fn user_agent(&self) -> &str {
        self.user_agent.as_str()
    }

    /// Replaces the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_carry_no_credentials() {
        let settings = HttpSettings::default();
        assert!(settings.token().is_none());
        assert!(settings.user_agent().starts_with("corynth-plugin-http/"));
    }

    #[rstest]
    #[case::blank("   ", None)]
    #[case::padded(" abc ", Some("abc"))]
    fn token_ignores_blank_values(#[case] raw: &str, #[case] expected: Option<&str>) {
        let settings = HttpSettings::default().with_token(raw);
        assert_eq!(settings.token(), expected);
    }

    #[test]
    fn debug_output_hides_the_token() {
        let settings = HttpSettings::default().with_token("s3cret");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("s3cret"), "{rendered}");
        assert!(rendered.contains("<redacted>"), "{rendered}");
    }

    #[test]
    fn missing_fields_deserialise_to_defaults() {
        let settings: HttpSettings = serde_json::from_str("{}").expect("deserialise");
        assert_eq!(settings, HttpSettings::default());
    }

    #[test]
    fn command_line_layer_overrides_user_agent() {
        let settings =
            HttpSettings::load_from_iter(["corynth-plugin-http", "--user-agent", "probe/2.0"])
                .expect("load settings");
        assert_eq!(settings.user_agent(), "probe/2.0");
    }
}
