use promptviz::chart::ChartKind;
use promptviz::claude::{ModelResponse, PromptDispatcher, PromptRequest};
use promptviz::config::ClaudeConfig;
use promptviz::constants;
use promptviz::visualizer::visualize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher(server: &MockServer, api_key: Option<&str>) -> PromptDispatcher {
    PromptDispatcher::new(ClaudeConfig {
        api_key: api_key.map(str::to_string),
        endpoint: format!("{}/v1/messages", server.uri()),
        model: "claude-3-haiku-20240307".to_string(),
        max_tokens: 4000,
    })
}

fn claude_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_123",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    }))
}

fn prompt(text: &str) -> PromptRequest {
    PromptRequest::new(text).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_json_text_becomes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku-20240307",
            "max_tokens": 4000,
            "system": constants::SYSTEM_PROMPT,
        })))
        .respond_with(claude_text(r#"{"title":"T","data":[1,2,3]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("test-key"))
        .dispatch(&prompt("Give me three numbers"))
        .await;

    assert_eq!(response, ModelResponse::Success(json!({"title": "T", "data": [1, 2, 3]})));
}

#[tokio::test]
async fn test_prompt_is_wrapped_in_json_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(claude_text("{}"))
        .mount(&server)
        .await;

    dispatcher(&server, Some("k"))
        .dispatch(&prompt("  tallest mountains  "))
        .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    let content = messages[0]["content"].as_str().unwrap();
    assert!(content.starts_with("tallest mountains\n\n"));
    assert!(content.ends_with(constants::JSON_INSTRUCTION));
}

#[tokio::test]
async fn test_non_json_text_is_wrapped_not_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(claude_text("not json"))
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("k")).dispatch(&prompt("hi")).await;

    assert_eq!(
        response,
        ModelResponse::Success(json!({
            "rawResponse": "not json",
            "note": constants::NON_JSON_NOTE,
        }))
    );
}

#[tokio::test]
async fn test_missing_api_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(claude_text("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let response = dispatcher(&server, None).dispatch(&prompt("hi")).await;

    let message = response.error().expect("expected a failure");
    assert!(message.contains("API key"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("bad")).dispatch(&prompt("hi")).await;
    assert_eq!(response, ModelResponse::Failure("invalid x-api-key".to_string()));
}

#[tokio::test]
async fn test_http_error_without_message_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("k")).dispatch(&prompt("hi")).await;
    assert_eq!(
        response,
        ModelResponse::Failure("Failed to get response from Claude".to_string())
    );
}

#[tokio::test]
async fn test_empty_content_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("k")).dispatch(&prompt("hi")).await;
    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("no text content"));
}

#[tokio::test]
async fn test_transport_failure_is_failure() {
    // Nothing listens on the discard port.
    let dispatcher = PromptDispatcher::new(ClaudeConfig {
        api_key: Some("k".to_string()),
        endpoint: "http://127.0.0.1:9/v1/messages".to_string(),
        ..ClaudeConfig::default()
    });

    let response = dispatcher.dispatch(&prompt("hi")).await;
    assert_eq!(
        response,
        ModelResponse::Failure("Failed to get response from Claude".to_string())
    );
}

#[tokio::test]
async fn test_dispatch_then_visualize() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("x-api-key"))
        .respond_with(claude_text(
            r#"{"title":"Sales","values":[{"name":"A","value":1},{"name":"B","value":2}],"citation":"Internal report"}"#,
        ))
        .mount(&server)
        .await;

    let response = dispatcher(&server, Some("k")).dispatch(&prompt("sales split")).await;
    let view = visualize(response.payload().unwrap());

    assert_eq!(view.chart.kind, ChartKind::Pie);
    assert_eq!(view.chart.labels, Some(vec!["A".to_string(), "B".to_string()]));
    assert_eq!(view.chart.series, vec![1.0, 2.0]);
    assert!(view.to_string().contains("Source: Internal report"));
}
