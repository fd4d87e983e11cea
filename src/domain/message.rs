//! Conversation messages
//!
//! Messages are append-only. They are only mutated in place to update status,
//! streamed content, and attached provider metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_message_id;

/// Who wrote a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Author {
    /// The human user
    User,
    /// System notices
    System,
    /// A configured participant, by id
    Participant(String),
}

impl Author {
    /// Participant id if the author is a participant
    pub fn participant_id(&self) -> Option<&str> {
        match self {
            Author::Participant(id) => Some(id),
            _ => None,
        }
    }

    /// Returns true if the author is the given participant
    pub fn is_participant(&self, participant_id: &str) -> bool {
        self.participant_id() == Some(participant_id)
    }
}

/// Status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Content is being generated, or a response to it is
    Streaming,
    /// Settled
    Complete,
    /// Generation failed; see `status_detail`
    Error,
    /// Generation was cancelled
    Cancelled,
}

impl MessageStatus {
    /// Returns true if the message will not change status again on its own
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Streaming)
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub author: Author,
    pub content: String,
    pub status: MessageStatus,

    /// Human-readable detail for error/cancelled states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,

    /// Provider-side generation metadata (token counts, cost)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<serde_json::Value>,

    /// First time the message reached `complete`. Kept when a finished
    /// message is later marked `streaming` as the trigger of another turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with a fresh id
    pub fn new(conversation_id: impl Into<String>, author: Author, content: impl Into<String>, status: MessageStatus) -> Self {
        let now = Utc::now();
        Self {
            id: generate_message_id(),
            conversation_id: conversation_id.into(),
            author,
            content: content.into(),
            status,
            status_detail: None,
            generation: None,
            completed_at: (status == MessageStatus::Complete).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// A complete message from the human user
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Author::User, content, MessageStatus::Complete)
    }

    /// A complete system notice
    pub fn system(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Author::System, content, MessageStatus::Complete)
    }

    /// An empty, streaming response placeholder for a participant
    pub fn streaming_response(conversation_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self::new(
            conversation_id,
            Author::Participant(participant_id.into()),
            String::new(),
            MessageStatus::Streaming,
        )
    }

    /// Move to a new status, recording an optional detail
    pub fn set_status(&mut self, status: MessageStatus, detail: Option<String>) {
        self.status = status;
        self.status_detail = detail;
        self.touch();
        if status == MessageStatus::Complete && self.completed_at.is_none() {
            self.completed_at = Some(self.updated_at);
        }
    }

    /// Whether the message was ever completed
    pub fn was_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
