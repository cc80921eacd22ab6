use super::*;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> OllamaGenerator {
    OllamaGenerator::new(&GenerationConfig {
        base_url: server.uri(),
        model: "llama3.2".to_string(),
        ..GenerationConfig::default()
    })
    .expect("generator")
}

#[tokio::test(flavor = "multi_thread")]
async fn generates_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2",
            "stream": false,
            "options": {"num_predict": 1024}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3.2",
            "response": "  The total revenue was $4.2M.\n",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = tokio::task::spawn_blocking(move || {
        generator.generate("Revenue: $4.2M", "What is the total revenue?")
    })
    .await
    .expect("task should join")
    .expect("generation should succeed");

    assert_eq!(answer, "The total revenue was $4.2M.");
}

#[tokio::test(flavor = "multi_thread")]
async fn prompt_contains_context_and_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "prompt": render_prompt("Revenue: $4.2M", "What is the total revenue?")
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"response": "ok", "done": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = tokio::task::spawn_blocking(move || {
        generator.generate("Revenue: $4.2M", "What is the total revenue?")
    })
    .await
    .expect("task should join");

    assert_eq!(answer.expect("generation should succeed"), "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_output_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate("", "question"))
        .await
        .expect("task should join");

    assert!(matches!(result, Err(QaError::GenerationProvider(_))));
}

#[test]
fn unreachable_runtime_is_provider_error() {
    let generator = OllamaGenerator::new(&GenerationConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 2,
        ..GenerationConfig::default()
    })
    .expect("generator");

    assert!(matches!(
        generator.generate("context", "question"),
        Err(QaError::GenerationProvider(_))
    ));
}
