//! Errors at the model-provider boundary

use std::time::Duration;

/// Errors that can occur while talking to a model provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized: provider rejected the API key")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Event source error: {0}")]
    EventSource(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Whether retrying the same call could succeed.
    /// Only the metadata fetch retries; the main completion never does.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Unauthorized => false,
            ProviderError::Network(_) => true,
            ProviderError::InvalidResponse(_) => false,
            ProviderError::Json(_) => false,
            ProviderError::MissingApiKey { .. } => false,
            ProviderError::EventSource(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(
            ProviderError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );

        assert!(
            ProviderError::Api {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_retryable()
        );

        assert!(
            !ProviderError::Api {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );

        assert!(!ProviderError::Unauthorized.is_retryable());
        assert!(!ProviderError::InvalidResponse("bad".to_string()).is_retryable());
        assert!(ProviderError::EventSource("dropped".to_string()).is_retryable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::MissingApiKey {
            env_var: "OPENROUTER_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing API key: environment variable OPENROUTER_API_KEY not set"
        );
        assert!(
            ProviderError::RateLimited {
                retry_after: Duration::from_secs(5)
            }
            .is_rate_limit()
        );
    }
}
