use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::{ClaudeConfig, ConfigError};
use crate::constants;

/// User text that survived trimming. Blank input never becomes a request,
/// so nothing downstream has to re-check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest(String);

impl PromptRequest {
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of one dispatch. Parse problems never show up here as failures:
/// non-JSON model output is wrapped into a `Success` payload instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Success(Value),
    Failure(String),
}

impl ModelResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ModelResponse::Success(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ModelResponse::Success(value) => Some(value),
            ModelResponse::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ModelResponse::Success(_) => None,
            ModelResponse::Failure(message) => Some(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to get response from Claude")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to get response from Claude")]
    Status(StatusCode),
    #[error("{0}")]
    Provider(String),
    #[error("Claude response contained no text content")]
    MissingText,
}

// Structures matching the Messages API
#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
    system: &'a str,
}

#[derive(Serialize, Debug)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
}

fn build_request<'a>(config: &'a ClaudeConfig, prompt: &PromptRequest) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        messages: vec![RequestMessage {
            role: "user",
            content: format!("{}\n\n{}", prompt.as_str(), constants::JSON_INSTRUCTION),
        }],
        system: constants::SYSTEM_PROMPT,
    }
}

/// Parses model output as JSON, falling back to a raw-text payload.
pub fn parse_model_text(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Model output is not JSON, keeping raw text");
            json!({
                "rawResponse": text,
                "note": constants::NON_JSON_NOTE,
            })
        }
    }
}

/// Issues single-shot requests to the Claude Messages API.
#[derive(Debug, Clone)]
pub struct PromptDispatcher {
    client: Client,
    config: ClaudeConfig,
}

impl PromptDispatcher {
    pub fn new(config: ClaudeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key().is_ok()
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    pub async fn dispatch(&self, prompt: &PromptRequest) -> ModelResponse {
        match self.request_text(prompt).await {
            Ok(text) => ModelResponse::Success(parse_model_text(&text)),
            Err(e) => {
                error!(error = ?e, "Error querying Claude");
                ModelResponse::Failure(e.to_string())
            }
        }
    }

    async fn request_text(&self, prompt: &PromptRequest) -> Result<String, DispatchError> {
        let api_key = self.config.api_key()?;
        let body = build_request(&self.config, prompt);

        info!(endpoint = %self.config.endpoint, "Making request to Claude API");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", constants::ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            error!(%status, body = %raw, "Claude API request failed");
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .filter(|m| !m.trim().is_empty());
            return Err(match message {
                Some(message) => DispatchError::Provider(message),
                None => DispatchError::Status(status),
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&raw).map_err(|e| {
            error!(error = %e, "Claude response body was not a messages response");
            DispatchError::MissingText
        })?;

        debug!(blocks = parsed.content.len(), "Received Claude response");

        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(DispatchError::MissingText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request_trims() {
        assert!(PromptRequest::new("").is_none());
        assert!(PromptRequest::new("  \n\t ").is_none());
        let request = PromptRequest::new("  population of France \n").unwrap();
        assert_eq!(request.as_str(), "population of France");
    }

    #[test]
    fn test_parse_model_text_json() {
        let value = parse_model_text(r#"{"title":"T","data":[1,2,3]}"#);
        assert_eq!(value, json!({"title": "T", "data": [1, 2, 3]}));
    }

    #[test]
    fn test_parse_model_text_fallback() {
        let value = parse_model_text("not json");
        assert_eq!(value["rawResponse"], "not json");
        assert_eq!(value["note"], constants::NON_JSON_NOTE);
    }

    #[test]
    fn test_request_body_shape() {
        let config = ClaudeConfig {
            api_key: Some("k".to_string()),
            endpoint: "http://localhost/v1/messages".to_string(),
            model: "claude-test".to_string(),
            max_tokens: 123,
        };
        let prompt = PromptRequest::new("hello").unwrap();
        let body = serde_json::to_value(build_request(&config, &prompt)).unwrap();

        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 123);
        assert_eq!(body["system"], constants::SYSTEM_PROMPT);
        assert_eq!(body["messages"][0]["role"], "user");
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with("hello\n\n"));
        assert!(content.contains("valid JSON only"));
        assert!(content.contains("\"citation\""));
    }

    #[test]
    fn test_model_response_accessors() {
        let ok = ModelResponse::Success(json!({"a": 1}));
        assert!(ok.is_success());
        assert_eq!(ok.payload(), Some(&json!({"a": 1})));
        assert!(ok.error().is_none());

        let failed = ModelResponse::Failure("boom".to_string());
        assert!(!failed.is_success());
        assert!(failed.payload().is_none());
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn test_missing_key_error_mentions_api_key() {
        let err = DispatchError::from(ConfigError::MissingApiKey);
        assert!(err.to_string().contains("API key"));
    }
}
