//! Provider trait and a scripted in-process implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::error::ProviderError;
use super::types::{CompletionRequest, CompletionResponse, GenerationMetadata, StreamChunk};

/// Stateless model provider - each call is independent
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Single completion request (returns once the whole reply is known)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Streaming completion; text deltas are sent on `chunk_tx` as they arrive
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Look up provider-side generation metadata.
    /// `Ok(None)` means "not available yet".
    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationMetadata>, ProviderError>;
}

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with this text
    Text(String),
    /// Wait, then reply with this text
    Delayed(Duration, String),
    /// Stream this text one word at a time, pausing between words
    Trickle(Duration, String),
    /// Fail with an API error carrying this message
    Fail(String),
    /// Never finish (until the task is aborted)
    Hang,
}

/// Scripted provider used by tests and the offline CLI mode.
///
/// Replies are consumed in order; once the script runs out every call fails.
#[derive(Debug, Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    generation_calls: AtomicU32,
    generation_misses: AtomicU32,
    generation_fails: bool,
    counter: AtomicU32,
}

impl MockProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Convenience: a script of plain text replies
    pub fn with_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| MockReply::Text(t.into())).collect())
    }

    /// Report "not available yet" this many times before returning metadata
    pub fn with_generation_misses(self, misses: u32) -> Self {
        self.generation_misses.store(misses, Ordering::SeqCst);
        self
    }

    /// Fail every metadata lookup with a retryable error
    pub fn with_failing_generation(mut self) -> Self {
        self.generation_fails = true;
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of metadata lookups made
    pub fn generation_calls(&self) -> u32 {
        self.generation_calls.load(Ordering::SeqCst)
    }

    /// Next scripted response, plus the pause between streamed chunks
    async fn next_reply(&self, request: CompletionRequest) -> Result<(CompletionResponse, Duration), ProviderError> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        let mut pause = Duration::ZERO;
        let content = match reply {
            Some(MockReply::Text(text)) => text,
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                text
            }
            Some(MockReply::Trickle(delay, text)) => {
                pause = delay;
                text
            }
            Some(MockReply::Fail(message)) => return Err(ProviderError::Api { status: 500, message }),
            Some(MockReply::Hang) => {
                std::future::pending::<()>().await;
                String::new()
            }
            None => return Err(ProviderError::InvalidResponse("no scripted reply left".to_string())),
        };

        let response = CompletionResponse {
            id: Some(format!("gen-mock-{}", n)),
            model: Some(request.model),
            content,
            finish_reason: Some("stop".to_string()),
            usage: None,
        };
        Ok((response, pause))
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let (response, _) = self.next_reply(request).await?;
        Ok(response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, ProviderError> {
        let (response, pause) = self.next_reply(request).await?;

        for (i, piece) in response.content.split_inclusive(' ').enumerate() {
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            chunk_tx
                .send(StreamChunk::TextDelta(piece.to_string()))
                .await
                .map_err(|_| ProviderError::EventSource("chunk receiver dropped".to_string()))?;
        }
        let _ = chunk_tx
            .send(StreamChunk::Done {
                finish_reason: response.finish_reason.clone(),
            })
            .await;

        Ok(response)
    }

    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationMetadata>, ProviderError> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);

        if self.generation_fails {
            return Err(ProviderError::Api {
                status: 503,
                message: "metadata unavailable".to_string(),
            });
        }

        let missed = self
            .generation_misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| m.checked_sub(1))
            .is_ok();
        if missed {
            return Ok(None);
        }

        Ok(Some(GenerationMetadata {
            id: generation_id.to_string(),
            model: Some("mock".to_string()),
            total_cost: Some(0.0),
            tokens_prompt: Some(0),
            tokens_completion: Some(0),
            latency: None,
            finish_reason: Some("stop".to_string()),
        }))
    }
}
