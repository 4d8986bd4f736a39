//! OpenAI-compatible chat-completions client.
//!
//! Talks to any backend exposing `POST {base_url}/chat/completions`
//! (OpenRouter by default). Transport errors, non-success statuses,
//! undecodable bodies and empty content all map to [`CompletionError`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_core::config::LlmConfig;
use relay_core::CompletionMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{CompletionError, CompletionService, GenerationParams};

/// HTTP completion client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Build a client from the `[llm]` configuration section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    /// The full chat-completions URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: error_message(&body_text),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        params: &GenerationParams,
    ) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::NotConfigured("API key is not set".to_string()))?;

        let request = ChatCompletionRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        tracing::info!(
            model = %params.model,
            temperature = params.temperature,
            messages = messages.len(),
            "Completion request"
        );

        let started = Instant::now();
        let result = self.send_request(api_key, &request).await;

        match &result {
            Ok(text) => tracing::info!(
                chars = text.chars().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Completion received"
            ),
            Err(e) => tracing::warn!(error = %e, "Completion failed"),
        }

        result
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(CompletionError::EmptyCompletion);
    }
    Ok(text)
}

/// Pull the human-readable message out of an OpenAI-style error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatCompletionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        assert_eq!(
            completions_endpoint("https://openrouter.ai/api/v1"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            CompletionMessage::system("Ты ассистент"),
            CompletionMessage::user("Привет!"),
        ];
        let request = ChatCompletionRequest {
            model: "test-model",
            messages: &messages,
            temperature: 0.5,
            max_tokens: 500,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "test-model");
        assert_eq!(value["max_tokens"], 500);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Привет!");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_extract_first_choice() {
        let response = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"Это тестовый ответ"}},
                           {"message":{"content":"second"}}]}"#,
        );
        assert_eq!(extract_text_response(response).unwrap(), "Это тестовый ответ");
    }

    #[test]
    fn test_extract_no_choices_is_empty_completion() {
        let response = parse(r#"{"choices":[]}"#);
        assert!(matches!(
            extract_text_response(response),
            Err(CompletionError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_extract_missing_choices_field_is_empty_completion() {
        let response = parse(r#"{"id":"gen-1"}"#);
        assert!(matches!(
            extract_text_response(response),
            Err(CompletionError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_extract_null_or_blank_content_is_empty_completion() {
        let null_content = parse(r#"{"choices":[{"message":{"content":null}}]}"#);
        assert!(extract_text_response(null_content).is_err());

        let blank = parse(r#"{"choices":[{"message":{"content":"  \n"}}]}"#);
        assert!(extract_text_response(blank).is_err());
    }

    #[test]
    fn test_error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"Invalid API key","code":401}}"#;
        assert_eq!(error_message(body), "Invalid API key");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_from_config_drops_blank_api_key() {
        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::from_config(&config).unwrap();
        assert!(client.api_key.is_none());
        assert_eq!(
            client.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_complete_without_api_key_fails_fast() {
        let client = OpenAiCompatibleClient::from_config(&LlmConfig::default()).unwrap();
        let result = client
            .complete(
                &[CompletionMessage::user("Привет!")],
                &GenerationParams::default(),
            )
            .await;
        assert!(matches!(result, Err(CompletionError::NotConfigured(_))));
    }
}
