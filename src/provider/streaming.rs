//! Streaming support for chat-completion responses.
//!
//! OpenAI-compatible providers stream Server-Sent Events where each `data:`
//! payload is a JSON chunk and the stream ends with a literal `[DONE]`:
//! ```text
//! data: {"id":"gen-1","choices":[{"delta":{"content":"Hel"}}]}
//! data: [DONE]
//! ```

use serde::Deserialize;

use super::error::ProviderError;
use super::types::{CompletionResponse, StreamChunk, Usage};

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    message: String,
}

/// Outcome of feeding one SSE payload to the accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    /// Chunks to forward, possibly empty (keep-alive, role-only deltas)
    Chunks(Vec<StreamChunk>),
    /// `[DONE]` received
    Done,
}

/// State tracker for a streamed completion.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pub id: Option<String>,
    pub model: Option<String>,
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one `data:` payload.
    ///
    /// In-band error objects become `ProviderError::Api`; malformed JSON is an
    /// invalid response.
    pub fn process_data(&mut self, data: &str) -> Result<StreamStep, ProviderError> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(StreamStep::Chunks(Vec::new()));
        }
        if data == "[DONE]" {
            return Ok(StreamStep::Done);
        }

        let payload: ChunkPayload = serde_json::from_str(data)
            .map_err(|e| ProviderError::InvalidResponse(format!("malformed stream chunk: {}", e)))?;

        if let Some(err) = payload.error {
            let status = err
                .code
                .as_ref()
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(500);
            return Err(ProviderError::Api {
                status,
                message: err.message,
            });
        }

        if self.id.is_none() {
            self.id = payload.id;
        }
        if self.model.is_none() {
            self.model = payload.model;
        }
        if payload.usage.is_some() {
            self.usage = payload.usage;
        }

        let mut chunks = Vec::new();
        for choice in payload.choices {
            if let Some(text) = choice.delta.and_then(|d| d.content)
                && !text.is_empty()
            {
                self.content.push_str(&text);
                chunks.push(StreamChunk::TextDelta(text));
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason.clone());
                chunks.push(StreamChunk::Done {
                    finish_reason: Some(reason),
                });
            }
        }

        Ok(StreamStep::Chunks(chunks))
    }

    /// Assemble the final response
    pub fn finish(self) -> CompletionResponse {
        CompletionResponse {
            id: self.id,
            model: self.model,
            content: self.content,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}
