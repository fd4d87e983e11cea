//! Model provider layer - the boundary the scheduler calls through
//!
//! This module provides:
//! - Prompt/response types for chat completions
//! - CompletionProvider trait for provider abstraction
//! - OpenRouterClient implementation (HTTP + SSE)
//! - MockProvider for tests and offline runs

pub mod client;
pub mod error;
pub mod openrouter;
pub mod streaming;
pub mod types;

pub use client::{CompletionProvider, MockProvider, MockReply};
pub use error::ProviderError;
pub use openrouter::OpenRouterClient;
pub use streaming::{StreamAccumulator, StreamStep};
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, GenerationMetadata, StreamChunk, Usage,
};
