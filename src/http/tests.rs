use super::*;
use serde::Deserialize;
use serial_test::serial;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Pong {
    ok: bool,
}

#[test]
fn error_message_extraction() {
    assert_eq!(
        extract_error_message(r#"{"error": "model \"x\" not found"}"#),
        "model \"x\" not found"
    );
    assert_eq!(
        extract_error_message(r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#),
        "Invalid API key"
    );
    assert_eq!(extract_error_message("  "), "empty response body");
    assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
}

#[test]
fn api_key_is_redacted_in_debug() {
    let key = ApiKey::new("sk-secret");
    assert_eq!(format!("{:?}", key), "ApiKey(<redacted>)");
    assert_eq!(key.header_value(), "Bearer sk-secret");
}

#[test]
#[serial]
fn api_key_from_env() {
    let var = "PDF_QA_TEST_API_KEY";

    // SAFETY: serialized with every other test that touches the environment
    unsafe { std::env::remove_var(var) };
    assert!(ApiKey::from_env(var).is_err());

    // SAFETY: see above
    unsafe { std::env::set_var(var, "   ") };
    assert!(ApiKey::from_env(var).is_err());

    // SAFETY: see above
    unsafe { std::env::set_var(var, "sk-test ") };
    let key = ApiKey::from_env(var).expect("key should be read");
    assert_eq!(key.header_value(), "Bearer sk-test");

    // SAFETY: see above
    unsafe { std::env::remove_var(var) };
}

#[tokio::test(flavor = "multi_thread")]
async fn post_json_sends_auth_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ping"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_json(serde_json::json!({"hello": "world"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/v1/ping", server.uri())).expect("url");
    let result = tokio::task::spawn_blocking(move || {
        let agent = build_agent(Duration::from_secs(5));
        post_json::<_, Pong>(
            &agent,
            &url,
            Some(&ApiKey::new("sk-test")),
            &serde_json::json!({"hello": "world"}),
        )
    })
    .await
    .expect("task should join");

    assert_eq!(result.expect("request should succeed"), Pong { ok: true });
}

#[tokio::test(flavor = "multi_thread")]
async fn post_json_surfaces_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"error": "model not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/api/embed", server.uri())).expect("url");
    let result = tokio::task::spawn_blocking(move || {
        let agent = build_agent(Duration::from_secs(5));
        post_json::<_, Pong>(&agent, &url, None, &serde_json::json!({}))
    })
    .await
    .expect("task should join");

    let message = result.expect_err("404 should fail").to_string();
    assert!(message.contains("HTTP 404"), "unexpected error: {message}");
    assert!(message.contains("model not found"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/api/generate", server.uri())).expect("url");
    let result = tokio::task::spawn_blocking(move || {
        let agent = build_agent(Duration::from_secs(5));
        post_json::<_, Pong>(&agent, &url, None, &serde_json::json!({}))
    })
    .await
    .expect("task should join");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/api/embed", server.uri())).expect("url");
    let result = tokio::task::spawn_blocking(move || {
        let agent = build_agent(Duration::from_secs(5));
        post_json::<_, Pong>(&agent, &url, None, &serde_json::json!({}))
    })
    .await
    .expect("task should join");

    let message = result.expect_err("should fail to decode").to_string();
    assert!(message.contains("Malformed response"), "unexpected error: {message}");
}

#[test]
fn unreachable_host_is_an_error() {
    let agent = build_agent(Duration::from_secs(2));
    let url = Url::parse("http://127.0.0.1:9/api/tags").expect("url");
    assert!(get_text(&agent, &url).is_err());
}
