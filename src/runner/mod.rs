//! Request runner module - drives one admitted request to completion.
//!
//! This module provides:
//! - `RequestRunner`: prompt → provider call → streamed assembly → finalize
//! - `build_prompt`: transcript to chat-role mapping
//! - `fetch_with_retry`: best-effort generation metadata lookup

mod metadata;
mod prompt;
mod request_runner;

pub use metadata::{MetadataPolicy, fetch_with_retry};
pub use prompt::{build_prompt, history_until};
pub(crate) use request_runner::RequestRunner;
pub use request_runner::NO_RESPONSE_PLACEHOLDER;

/// Configuration for request runners.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Use the provider's streaming endpoint and persist chunks as they arrive
    pub use_streaming: bool,
    /// Maximum tokens for responses (provider default when None)
    pub max_tokens: Option<u32>,
    /// Metadata lookup retry policy
    pub metadata: MetadataPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            use_streaming: true,
            max_tokens: None,
            metadata: MetadataPolicy::default(),
        }
    }
}

impl RunnerConfig {
    pub fn with_streaming(mut self, use_streaming: bool) -> Self {
        self.use_streaming = use_streaming;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataPolicy) -> Self {
        self.metadata = metadata;
        self
    }
}
