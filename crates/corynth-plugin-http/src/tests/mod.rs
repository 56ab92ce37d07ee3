//! Crate-level unit and BDD tests for the HTTP plugin.

use std::time::Duration;

use corynth_plugin::codec;
use mockall::mock;
use rstest::rstest;
use serde_json::{Value, json};

use super::*;


mock! {
    Transport {}
    impl HttpTransport for Transport {
        fn send(
            &self,
            request: &HttpRequest,
            timeout: Option<Duration>,
        ) -> Result<HttpResponse, HttpError>;
    }
}

fn decoded(spec: &ActionSpec, request: &Value) -> ParameterSet {
    codec::decode(request.to_string().as_bytes(), spec).expect("request should decode")
}

fn prepared(method: Method, request: &Value, settings: &HttpSettings) -> HttpRequest {
    let spec = match method {
        Method::Get => get_spec(),
        Method::Post => post_spec(),
    };
    prepare(method, &decoded(&spec, request), settings).expect("request prepares")
}

/// Runs one exchange through a runtime backed by `transport`.
fn invoke(transport: MockTransport, settings: HttpSettings, action: &str, request: &Value) -> Value {
    let runtime = runtime_with(HttpState::new(transport, settings)).expect("http plugin builds");
    let body = request.to_string();
    let mut stdout = Vec::new();
    runtime
        .run(["http", action], &mut body.as_bytes(), &mut stdout)
        .expect("exchange completes");
    serde_json::from_slice(&stdout).expect("one JSON document")
}

fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body).with_header("content-type", "application/json")
}

#[test]
fn get_applies_headers_and_basic_auth() {
    let request = prepared(
        Method::Get,
        &json!({
            "url": "https://api.example.com/items?page=2",
            "headers": {"Accept": "application/json", "X-Retry": 3},
            "auth": {"username": "ada", "password": "secret"},
        }),
        &HttpSettings::default().with_token("ignored"),
    );
    assert_eq!(request.method(), Method::Get);
    assert_eq!(request.url().as_str(), "https://api.example.com/items?page=2");
    assert_eq!(request.headers(), [(String::from("Accept"), String::from("application/json"))]);
    assert_eq!(request.basic_auth(), Some(&BasicAuth::new("ada", "secret")));
    assert!(request.body().is_none());
}

#[rstest]
#[case::username_only(json!({"username": "ada"}))]
#[case::numeric_password(json!({"username": "ada", "password": 42}))]
fn incomplete_auth_is_ignored(#[case] auth: Value) {
    let request = prepared(
        Method::Get,
        &json!({"url": "http://example.com", "auth": auth}),
        &HttpSettings::default(),
    );
    assert!(request.basic_auth().is_none());
}

#[test]
fn configured_token_fills_in_missing_credentials() {
    let request = prepared(
        Method::Get,
        &json!({"url": "http://example.com"}),
        &HttpSettings::default().with_token("t0ken"),
    );
    assert_eq!(request.header("Authorization"), Some("Bearer t0ken"));
}

#[test]
fn explicit_authorization_header_beats_the_token() {
    let request = prepared(
        Method::Get,
        &json!({"url": "http://example.com", "headers": {"authorization": "Token abc"}}),
        &HttpSettings::default().with_token("t0ken"),
    );
    assert_eq!(request.header("Authorization"), Some("Token abc"));
    assert_eq!(request.headers().len(), 1);
}

#[test]
fn post_json_wins_over_body() {
    let request = prepared(
        Method::Post,
        &json!({"url": "http://example.com", "json": {"a": 1}, "body": "ignored"}),
        &HttpSettings::default(),
    );
    assert_eq!(request.header("content-type"), Some(DEFAULT_CONTENT_TYPE));
    let sent: Value = serde_json::from_slice(request.body().expect("body")).expect("json body");
    assert_eq!(sent, json!({"a": 1}));
}

#[test]
fn post_body_uses_content_type_unless_headers_override_it() {
    let plain = prepared(
        Method::Post,
        &json!({"url": "http://example.com", "body": "a,b", "content_type": "text/csv"}),
        &HttpSettings::default(),
    );
    assert_eq!(plain.header("Content-Type"), Some("text/csv"));
    assert_eq!(plain.body(), Some(b"a,b".as_slice()));

    let overridden = prepared(
        Method::Post,
        &json!({
            "url": "http://example.com",
            "body": "<a/>",
            "content_type": "text/csv",
            "headers": {"content-type": "application/xml"},
        }),
        &HttpSettings::default(),
    );
    assert_eq!(overridden.header("Content-Type"), Some("application/xml"));
    assert_eq!(overridden.headers().len(), 1);
}

#[test]
fn get_forwards_default_timeout_and_reports_response() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request, timeout| {
            request.url().as_str() == "http://example.com/status"
                && timeout.is_some_and(|limit| {
                    limit <= Duration::from_secs(DEFAULT_TIMEOUT_SECS)
                        && limit > Duration::from_secs(DEFAULT_TIMEOUT_SECS - 5)
                })
        })
        .times(1)
        .returning(|_, _| Ok(json_response(200, r#"{"healthy": true}"#)));

    let document = invoke(
        transport,
        HttpSettings::default(),
        "get",
        &json!({"url": "http://example.com/status"}),
    );
    assert_eq!(
        document,
        json!({
            "status_code": 200,
            "headers": {"content-type": "application/json"},
            "content": r#"{"healthy": true}"#,
            "json": {"healthy": true},
        })
    );
}

#[test]
fn non_json_response_has_no_json_field() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_, _| Ok(HttpResponse::new(200, "plain").with_header("Content-Type", "text/plain")));
    let document = invoke(
        transport,
        HttpSettings::default(),
        "get",
        &json!({"url": "http://example.com"}),
    );
    assert!(document.get("json").is_none(), "{document}");
    assert_eq!(document.get("content"), Some(&json!("plain")));
}

#[rstest]
#[case::not_found(404)]
#[case::server_error(503)]
fn error_status_is_a_failure_with_response_fields(#[case] status: u16) {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(move |_, _| Ok(json_response(status, r#"{"detail": "nope"}"#)));
    let document = invoke(
        transport,
        HttpSettings::default(),
        "post",
        &json!({"url": "http://example.com", "json": {}}),
    );
    assert_eq!(
        document.get("error").and_then(Value::as_str),
        Some(format!("request returned HTTP {status}").as_str())
    );
    assert_eq!(document.get("status_code"), Some(&json!(status)));
    assert_eq!(document.pointer("/json/detail"), Some(&json!("nope")));
}

#[test]
fn transport_failure_is_a_failure_envelope() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_, _| {
        Err(HttpError::Request {
            message: String::from("connection refused"),
        })
    });
    let document = invoke(
        transport,
        HttpSettings::default(),
        "get",
        &json!({"url": "http://example.com"}),
    );
    assert_eq!(document, json!({"error": "request failed: connection refused"}));
}

#[rstest]
#[case::scheme("ftp://example.com/file", "unsupported url scheme 'ftp'")]
#[case::relative("/just/a/path", "invalid url '/just/a/path'")]
fn bad_urls_never_reach_the_transport(#[case] url: &str, #[case] expected: &str) {
    let mut transport = MockTransport::new();
    transport.expect_send().never();
    let document = invoke(
        transport,
        HttpSettings::default(),
        "get",
        &json!({"url": url}),
    );
    let message = document.get("error").and_then(Value::as_str).unwrap_or_default();
    assert!(message.starts_with(expected), "{message}");
}

#[test]
fn missing_url_is_a_decode_failure() {
    let mut transport = MockTransport::new();
    transport.expect_send().never();
    let document = invoke(
        transport,
        HttpSettings::default(),
        "get",
        &json!({"headers": {}}),
    );
    assert_eq!(document, json!({"error": "missing required parameter 'url'"}));
}

#[test]
fn actions_are_get_then_post() {
    let runtime = runtime_with(HttpState::new(MockTransport::new(), HttpSettings::default()))
        .expect("http plugin builds");
    let names: Vec<&str> = runtime
        .registry()
        .list()
        .into_iter()
        .map(ActionSpec::name)
        .collect();
    assert_eq!(names, ["get", "post"]);
}
