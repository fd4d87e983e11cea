//! Best-effort generation metadata lookup.
//!
//! Providers usually publish token counts and cost a little after the
//! completion finishes, so the lookup is retried with exponential backoff.
//! Giving up is silent; it never touches the message status.

use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};

use crate::provider::{CompletionProvider, GenerationMetadata};

/// Retry policy for the metadata lookup
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataPolicy {
    /// Total lookups, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl MetadataPolicy {
    /// Never look anything up
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Fetch generation metadata, retrying misses and transient failures.
///
/// Returns None once attempts run out or the provider reports a
/// non-retryable error.
pub async fn fetch_with_retry(
    provider: &dyn CompletionProvider,
    generation_id: &str,
    policy: &MetadataPolicy,
) -> Option<GenerationMetadata> {
    let mut backoff = policy.backoff();

    for attempt in 1..=policy.max_attempts {
        match provider.fetch_generation(generation_id).await {
            Ok(Some(metadata)) => return Some(metadata),
            Ok(None) => {
                tracing::debug!(generation_id, attempt, "Generation metadata not available yet");
            }
            Err(e) if e.is_retryable() => {
                tracing::debug!(generation_id, attempt, error = %e, "Generation metadata lookup failed");
            }
            Err(e) => {
                tracing::warn!(generation_id, error = %e, "Giving up on generation metadata");
                return None;
            }
        }

        if attempt < policy.max_attempts {
            let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
            tokio::time::sleep(delay).await;
        }
    }

    tracing::debug!(generation_id, "Generation metadata never arrived");
    None
}
