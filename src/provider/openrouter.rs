//! OpenRouter API client implementation
//!
//! This module implements the CompletionProvider trait for OpenRouter's
//! OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::client::CompletionProvider;
use super::error::ProviderError;
use super::streaming::{StreamAccumulator, StreamStep};
use super::types::{CompletionRequest, CompletionResponse, GenerationMetadata, StreamChunk, Usage};
use crate::config::ProviderConfig;

/// Default retry-after when a 429 carries no header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationBody {
    data: Option<GenerationMetadata>,
}

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    config: ProviderConfig,
}

impl OpenRouterClient {
    /// Create a new client, reading the API key from `config.api_key_env`
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| ProviderError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { client, api_key, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Attach auth and attribution headers
    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder
            .bearer_auth(&self.api_key)
            .header("X-Title", &self.config.app_title);
        if let Some(url) = &self.config.app_url {
            builder = builder.header("HTTP-Referer", url);
        }
        builder
    }

    /// Build the request body for the chat completions endpoint
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> Value {
        let model = if request.model.trim().is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut body = json!({
            "model": model,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.metadata.is_empty() {
            body["metadata"] = json!(request.metadata);
        }

        body
    }

    /// Parse a non-streamed response body
    fn parse_response(&self, body: ChatCompletionBody) -> Result<CompletionResponse, ProviderError> {
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in API response".to_string()))?;

        Ok(CompletionResponse {
            id: body.id,
            model: body.model,
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: body.usage,
        })
    }

    /// Map a non-success status to a provider error
    async fn status_error(status: StatusCode, response: Response) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::Unauthorized,
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                ProviderError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                }
            }
            code => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                ProviderError::Api { status: code, message }
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request, false);
        let response = self
            .decorate(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        let parsed: ChatCompletionBody = response.json().await?;
        self.parse_response(parsed)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request, true);
        let mut source = self
            .decorate(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .eventsource()
            .map_err(|e| ProviderError::EventSource(e.to_string()))?;

        let mut acc = StreamAccumulator::new();

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => match acc.process_data(&message.data) {
                    Ok(StreamStep::Done) => break,
                    Ok(StreamStep::Chunks(chunks)) => {
                        for chunk in chunks {
                            if chunk_tx.send(chunk).await.is_err() {
                                source.close();
                                return Err(ProviderError::EventSource("chunk receiver dropped".to_string()));
                            }
                        }
                    }
                    Err(e) => {
                        source.close();
                        return Err(e);
                    }
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    source.close();
                    return Err(Self::status_error(status, response).await);
                }
                Err(e) => {
                    source.close();
                    return Err(ProviderError::EventSource(e.to_string()));
                }
            }
        }
        source.close();

        Ok(acc.finish())
    }

    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationMetadata>, ProviderError> {
        let response = self
            .decorate(self.client.get(self.endpoint("generation")))
            .query(&[("id", generation_id)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        let body: GenerationBody = response.json().await?;
        Ok(body.data)
    }
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.config.base_url)
            .field("default_model", &self.config.default_model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::ChatMessage;

    fn client() -> OpenRouterClient {
        OpenRouterClient::with_api_key("test-key".to_string(), ProviderConfig::default()).unwrap()
    }

    #[test]
    fn test_client_without_api_key() {
        let config = ProviderConfig {
            api_key_env: "SYMPOSIUM_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = OpenRouterClient::new(config).unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = ProviderConfig {
            base_url: "https://example.test/api/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenRouterClient::with_api_key("k".to_string(), config).unwrap();
        assert_eq!(client.endpoint("generation"), "https://example.test/api/v1/generation");
    }

    #[test]
    fn test_build_request_basic() {
        let request = CompletionRequest::new(
            "anthropic/claude-3.5-sonnet",
            vec![ChatMessage::system("Be brief"), ChatMessage::assistant("Hi", "Alpha")],
        )
        .with_temperature(0.4)
        .with_metadata("participant_id", "alpha");

        let body = client().build_request(&request, true);

        assert_eq!(body["model"], "anthropic/claude-3.5-sonnet");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.4);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["name"], "Alpha");
        assert_eq!(body["metadata"]["participant_id"], "alpha");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let request = CompletionRequest::new("", vec![ChatMessage::user("Hello")]);
        let body = client().build_request(&request, false);
        assert_eq!(body["model"], ProviderConfig::default().default_model);
        assert!(body.get("metadata").is_none());
    }

    #[test]
    fn test_parse_response_text() {
        let body: ChatCompletionBody = serde_json::from_value(json!({
            "id": "gen-42",
            "model": "openrouter/auto",
            "choices": [{"message": {"role": "assistant", "content": "Hello there!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let response = client().parse_response(body).unwrap();
        assert_eq!(response.id.as_deref(), Some("gen-42"));
        assert_eq!(response.content, "Hello there!");
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(15));
    }

    #[test]
    fn test_parse_response_no_choices() {
        let body: ChatCompletionBody = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = client().parse_response(body).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
