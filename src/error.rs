//! Error types for Symposium
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::provider::ProviderError;

/// All error types that can occur in Symposium
#[derive(Debug, Error)]
pub enum SymposiumError {
    /// Conversation not found in storage
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Participant not registered with the scheduler
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Message not found in storage
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Request is neither queued nor in flight
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration rejected by validation
    #[error("Config error: {0}")]
    Config(String),

    /// Model provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Symposium operations
pub type Result<T> = std::result::Result<T, SymposiumError>;
