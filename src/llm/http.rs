//! # HTTP Completion Client
//!
//! ## Purpose
//! Concrete [`CompletionClient`] over an OpenAI-compatible chat-completions
//! endpoint. Handles authentication, timeouts, retry with backoff, and hands
//! raw model output to the boundary decoder.
//!
//! ## Input/Output Specification
//! - **Input**: [`CompletionRequest`] prompts, endpoint configuration
//! - **Output**: [`CompletionOutcome`]: decoded assessment or tagged failure
//! - **Retries**: Transport errors, 5xx, and 429 responses retry up to the
//!   configured attempt count; other 4xx responses fail immediately
//!
//! ## Key Features
//! - JSON response format requested from the endpoint
//! - Configurable model, temperature, and token budget
//! - Tagged failures; no untyped responses escape this module

use super::{decode_assessment, CompletionClient, CompletionOutcome, CompletionRequest};
use crate::config::LlmConfig;
use crate::errors::{CheckError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// OpenAI-compatible chat-completions client
pub struct HttpCompletionClient {
    config: LlmConfig,
    client: Client,
}

/// Request body for the chat-completions endpoint
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ChatResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Response body from the chat-completions endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpCompletionClient {
    /// Build the client from LLM configuration
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", api_key)
                    .parse()
                    .map_err(|e| CheckError::Config {
                        message: format!("Invalid API key format: {}", e),
                    })?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .user_agent("citecheck/0.1")
            .build()
            .map_err(|e| CheckError::LlmTransport {
                details: e.to_string(),
            })?;

        Ok(Self { config, client })
    }

    /// One HTTP round trip; `Ok` carries the raw model output text
    async fn send_once(&self, request: &CompletionRequest) -> std::result::Result<String, SendError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ChatResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Retryable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SendError::Retryable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(SendError::Fatal(format!("HTTP {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SendError::Fatal(format!("response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SendError::Fatal("response contained no choices".to_string()))
    }
}

/// Whether a failed round trip is worth retrying
enum SendError {
    Retryable(String),
    Fatal(String),
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> CompletionOutcome {
        let mut last_error = String::new();

        for attempt in 0..=self.config.retry_attempts {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    error = %last_error,
                    "Retrying LLM completion request"
                );
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.send_once(request).await {
                Ok(raw) => return decode_assessment(&raw),
                Err(SendError::Retryable(reason)) => {
                    last_error = reason;
                }
                Err(SendError::Fatal(reason)) => {
                    return CompletionOutcome::TransportFailure { reason };
                }
            }
        }

        CompletionOutcome::TransportFailure {
            reason: format!(
                "exhausted {} retries: {}",
                self.config.retry_attempts, last_error
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::llm::ResponseFormat;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: String, retry_attempts: u32) -> LlmConfig {
        LlmConfig {
            api_url,
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            max_tokens: 512,
            temperature: 0.0,
            request_timeout_seconds: 5,
            retry_attempts,
            retry_delay_seconds: 0,
            rate_limit: RateLimitConfig {
                requests_per_minute: 600,
                min_delay_ms: 0,
            },
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You check citations.".to_string(),
            user_prompt: "Check this one.".to_string(),
            response_format: ResponseFormat::Json,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn successful_completion_decodes_assessment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                r#"{"is_correct": true, "errors": []}"#,
            )))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config(
            format!("{}/v1/chat/completions", server.uri()),
            0,
        ))
        .unwrap();

        match client.complete(&request()).await {
            CompletionOutcome::Success(assessment) => assert!(assessment.is_correct),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unparseable_model_output_is_a_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("not json at all")),
            )
            .mount(&server)
            .await;

        let client =
            HttpCompletionClient::new(config(server.uri(), 0)).unwrap();

        assert!(matches!(
            client.complete(&request()).await,
            CompletionOutcome::ParseFailure { .. }
        ));
    }

    #[tokio::test]
    async fn server_errors_exhaust_retries_into_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client =
            HttpCompletionClient::new(config(server.uri(), 2)).unwrap();

        match client.complete(&request()).await {
            CompletionOutcome::TransportFailure { reason } => {
                assert!(reason.contains("exhausted"));
            }
            other => panic!("expected transport failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpCompletionClient::new(config(server.uri(), 3)).unwrap();

        assert!(matches!(
            client.complete(&request()).await,
            CompletionOutcome::TransportFailure { .. }
        ));
    }
}
