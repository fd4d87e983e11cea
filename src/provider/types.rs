//! Request and response shapes at the provider boundary
//!
//! Only the minimal chat-completion shape is modelled: role-tagged messages,
//! sampling temperature and free-form metadata tags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generic chat role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single prompt message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,

    /// Speaker display name for assistant turns from other participants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// A completion request - everything needed for one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Provider model string
    pub model: String,

    /// Prompt, system prompt first
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: Option<f64>,

    /// Max tokens for the response
    pub max_tokens: Option<u32>,

    /// Free-form tags (conversation id, participant id)
    pub metadata: BTreeMap<String, String>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Token usage as reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Final result of a completion, streamed or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Provider generation id, used for the metadata lookup
    pub id: Option<String>,
    pub model: Option<String>,
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Provider-side generation record (token counts, cost)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub tokens_prompt: Option<u64>,
    #[serde(default)]
    pub tokens_completion: Option<u64>,
    #[serde(default)]
    pub latency: Option<u64>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Streaming chunk forwarded to the runner
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text being generated
    TextDelta(String),

    /// Stream finished
    Done { finish_reason: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serialization() {
        let msg = ChatMessage::assistant("Hi", "Alpha");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["name"], "Alpha");

        let msg = ChatMessage::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_completion_request_builder() {
        let req = CompletionRequest::new("openrouter/auto", vec![ChatMessage::system("Be brief")])
            .with_temperature(0.7)
            .with_metadata("conversation_id", "conv-1");
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.metadata.get("conversation_id").map(String::as_str), Some("conv-1"));
    }

    #[test]
    fn test_generation_metadata_partial() {
        let json = serde_json::json!({"id": "gen-1", "total_cost": 0.0012, "unknown": true});
        let meta: GenerationMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.id, "gen-1");
        assert_eq!(meta.total_cost, Some(0.0012));
        assert!(meta.tokens_prompt.is_none());
    }
}
