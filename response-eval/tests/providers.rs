//! Integration tests for the provider clients and provider-backed judging.
//!
//! Uses wiremock for HTTP mocking.

use std::sync::Arc;
use std::time::Duration;

use response_eval::judge::{Evaluator, HeuristicJudge, JudgeDispatcher, JudgeError, ProviderJudge};
use response_eval::model::Dimension;
use response_eval::providers::{
    AnthropicClient, CompletionRequest, GeminiClient, LLMProvider, Message, OpenAIClient,
    ProviderError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VERDICT: &str = r#"{"instruction_following": 0.9, "hallucination_prevention": 0.8, "assumption_prevention": 0.7, "coherence": 1.0, "accuracy": 0.6, "reason": "Accurate and concise"}"#;

fn openai_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160}
    })
}

fn judge_request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("Evaluate this")], 1024)
        .with_system("You are an expert evaluator. Return only valid JSON.")
        .with_temperature(0.3)
        .with_json_output()
}

#[tokio::test]
async fn test_openai_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": "You are an expert evaluator. Return only valid JSON."},
                {"role": "user", "content": "Evaluate this"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(VERDICT)))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(mock_server.uri());
    let response = client.complete(&judge_request()).await.expect("completion failed");

    assert_eq!(response.content, VERDICT);
    assert_eq!(response.input_tokens, 120);
    assert_eq!(response.output_tokens, 40);
    assert_eq!(response.finish_reason, "stop");
    assert_eq!(client.rate_limiter().current_token_usage().await, 160);
}

#[tokio::test]
async fn test_openai_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "The server had an error", "type": "server_error"}
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(mock_server.uri());
    match client.complete(&judge_request()).await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "The server had an error");
        }
        other => panic!("expected Api error, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn test_openai_auth_and_rate_limit() {
    let auth_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .mount(&auth_server)
        .await;

    let client = OpenAIClient::new("bad-key").with_base_url(auth_server.uri());
    let result = client.complete(&judge_request()).await;
    assert!(matches!(result, Err(ProviderError::Config(ref m)) if m.contains("Incorrect API key")));

    let limited_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&limited_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(limited_server.uri());
    let result = client.complete(&judge_request()).await;
    assert!(matches!(
        result,
        Err(ProviderError::RateLimited { retry_after_ms: 7000 })
    ));
}

#[tokio::test]
async fn test_anthropic_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "max_tokens": 1024,
            "system": "You are an expert evaluator. Return only valid JSON.",
            "messages": [{"role": "user", "content": "Evaluate this"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-opus-20240229",
            "content": [
                {"type": "text", "text": "```json\n"},
                {"type": "text", "text": VERDICT},
                {"type": "text", "text": "\n```"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 100, "output_tokens": 50}
        })))
        .mount(&mock_server)
        .await;

    let client = AnthropicClient::new("test-key").with_base_url(mock_server.uri());
    let response = client.complete(&judge_request()).await.expect("completion failed");

    assert_eq!(response.content, format!("```json\n{}\n```", VERDICT));
    assert_eq!(response.model, "claude-3-opus-20240229");
    assert_eq!(response.finish_reason, "end_turn");
}

#[tokio::test]
async fn test_gemini_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Evaluate this"}]}],
            "systemInstruction": {
                "parts": [{"text": "You are an expert evaluator. Return only valid JSON."}]
            },
            "generationConfig": {"maxOutputTokens": 1024}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": VERDICT}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 90, "candidatesTokenCount": 30}
        })))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(mock_server.uri());
    let response = client.complete(&judge_request()).await.expect("completion failed");

    assert_eq!(response.content, VERDICT);
    assert_eq!(response.model, "gemini-1.5-flash");
    assert_eq!(response.input_tokens, 90);
    assert_eq!(response.output_tokens, 30);
    assert_eq!(response.finish_reason, "STOP");
}

#[tokio::test]
async fn test_gemini_without_candidates_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(mock_server.uri());
    assert!(matches!(
        client.complete(&judge_request()).await,
        Err(ProviderError::Parse(_))
    ));
}

#[tokio::test]
async fn test_provider_judge_parses_verdict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(VERDICT)))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(mock_server.uri());
    let judge = ProviderJudge::new(Arc::new(client));
    let verdict = judge
        .evaluate("What is AI?", "AI is artificial intelligence.", Some("Artificial Intelligence"))
        .await
        .expect("judge failed");

    assert!((verdict.score - 0.8).abs() < 1e-9);
    assert_eq!(verdict.rationale, "Accurate and concise");
    assert_eq!(verdict.dimension_scores.get(Dimension::Coherence), Some(1.0));
}

#[tokio::test]
async fn test_dispatcher_falls_back_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(mock_server.uri());
    let evaluator = Arc::new(ProviderJudge::new(Arc::new(client)));

    let with_fallback =
        JudgeDispatcher::with_evaluator(evaluator.clone(), Duration::from_secs(5), true);
    let verdict = with_fallback
        .judge("What is AI?", "AI is artificial intelligence.", None)
        .await
        .expect("fallback should succeed");
    assert_eq!(
        verdict,
        HeuristicJudge::new().judge("What is AI?", "AI is artificial intelligence.", None)
    );

    let strict = JudgeDispatcher::with_evaluator(evaluator, Duration::from_secs(5), false);
    let err = strict
        .judge("What is AI?", "AI is artificial intelligence.", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JudgeError::ProviderCallFailure(ProviderError::Api { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_dispatcher_times_out_slow_provider() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_body(VERDICT))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("test-key").with_base_url(mock_server.uri());
    let dispatcher = JudgeDispatcher::with_evaluator(
        Arc::new(ProviderJudge::new(Arc::new(client))),
        Duration::from_millis(100),
        false,
    );

    let err = dispatcher.judge("Q", "A.", None).await.unwrap_err();
    assert!(matches!(
        err,
        JudgeError::ProviderCallFailure(ProviderError::Timeout { timeout_ms: 100 })
    ));
}
