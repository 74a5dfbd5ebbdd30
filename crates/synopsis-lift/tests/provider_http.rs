use std::time::Duration;
use synopsis_core::config::SynopsisConfig;
use synopsis_lift::{
    Acceptance, GeminiClient, GenerateOptions, GenerationClient, GenerationParams, OpenAiClient,
    ProviderError, Summarizer,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

const PASSING: &str = "Summary: The team published slides outlining its third-quarter plans.\n\
Detailed summary:\n\
・The slides list search, billing, and export as the three Q3 roadmap items.\n\
Tags: roadmap";

fn params(timeout: Duration) -> GenerationParams<'static> {
    GenerationParams {
        system: "system",
        prompt: "prompt",
        max_output_tokens: 256,
        temperature: 0.2,
        timeout,
    }
}

fn gemini_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 17}
    })
}

async fn gemini_with(status: u16, body: serde_json::Value) -> (MockServer, GeminiClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    let client = GeminiClient::new("test-key".to_string(), None, Some(server.uri()));
    (server, client)
}

#[tokio::test]
async fn test_gemini_success_reads_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("Summary: hi")))
        .expect(1)
        .mount(&server)
        .await;
    let client = GeminiClient::new("test-key".to_string(), None, Some(server.uri()));

    let raw = client.generate(&params(Duration::from_secs(5))).await.unwrap();
    assert_eq!(raw.text, "Summary: hi");
    assert_eq!(raw.input_tokens, Some(42));
    assert_eq!(raw.output_tokens, Some(17));
}

#[tokio::test]
async fn test_gemini_server_error_is_transient() {
    let (_server, client) = gemini_with(
        503,
        serde_json::json!({"error": {"code": 503, "message": "overloaded"}}),
    )
    .await;

    let err = client
        .generate(&params(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProviderError::Server {
            status: 503,
            message: "overloaded".to_string()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gemini_rate_limit() {
    let (_server, client) = gemini_with(
        429,
        serde_json::json!({"error": {"code": 429, "message": "quota exceeded"}}),
    )
    .await;

    let err = client
        .generate(&params(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gemini_bad_key_is_config_error() {
    let (_server, client) = gemini_with(
        401,
        serde_json::json!({"error": {"code": 401, "message": "API key not valid"}}),
    )
    .await;

    let err = client
        .generate(&params(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_gemini_empty_candidates() {
    let (_server, client) = gemini_with(200, serde_json::json!({"candidates": []})).await;

    let err = client
        .generate(&params(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::EmptyCandidates);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gemini_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;
    let client = GeminiClient::new("test-key".to_string(), None, Some(server.uri()));

    let err = client
        .generate(&params(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_body("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let client = GeminiClient::new("test-key".to_string(), None, Some(server.uri()));

    let err = client
        .generate(&params(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Timeout);
}

#[tokio::test]
async fn test_openai_success_uses_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer o-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Summary: ok"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = OpenAiClient::new("o-key".to_string(), None, Some(server.uri()));

    let raw = client.generate(&params(Duration::from_secs(5))).await.unwrap();
    assert_eq!(raw.text, "Summary: ok");
    assert_eq!(raw.input_tokens, Some(9));
}

#[tokio::test]
async fn test_summarizer_retries_server_error_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(PASSING)))
        .mount(&server)
        .await;

    let mut config = SynopsisConfig::default();
    config.generation.retry_delays_ms = vec![0];
    let client = GeminiClient::new("test-key".to_string(), None, Some(server.uri()));
    let summarizer = Summarizer::new(client, config);
    let options = GenerateOptions {
        max_retries: 2,
        ..summarizer.options()
    };

    let outcome = summarizer
        .generate("Q3 roadmap", "Slides: our Q3 roadmap.", &options)
        .await
        .unwrap();

    assert_eq!(outcome.accepted_by, Acceptance::Passed);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.usage.calls, 2);
    assert_eq!(outcome.usage.input_tokens, 42);
    assert_eq!(outcome.artifact.tags, vec!["Roadmap"]);
}
