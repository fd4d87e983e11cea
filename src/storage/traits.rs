//! Conversation/message store trait.

use crate::domain::{Conversation, Message, MessageStatus};
use crate::error::Result;

/// Persistence collaborator for conversations and messages.
///
/// Calls are synchronous and short; the scheduler may call them while holding
/// its state lock.
pub trait MessageStore: Send + Sync {
    /// Create a new conversation.
    fn create_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Get a conversation by ID.
    fn conversation(&self, id: &str) -> Result<Option<Conversation>>;

    /// All conversations, oldest first.
    fn conversations(&self) -> Result<Vec<Conversation>>;

    /// Replace an existing conversation.
    fn update_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Delete a conversation and all of its messages.
    fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Append a message to its conversation's transcript.
    fn append_message(&self, message: &Message) -> Result<()>;

    /// Get a message by ID.
    fn message(&self, id: &str) -> Result<Option<Message>>;

    /// Messages of a conversation in transcript order.
    fn messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Replace an existing message (status, content, metadata).
    fn update_message(&self, message: &Message) -> Result<()>;

    /// Set a message's status if it exists. Returns the updated message.
    ///
    /// Applied under the store's own write lock, so concurrent edits of
    /// other fields are never lost.
    fn set_message_status(&self, id: &str, status: MessageStatus, detail: Option<String>) -> Result<Option<Message>>;

    /// Attach generation metadata without touching status or content.
    /// Returns false if the message no longer exists.
    fn attach_generation(&self, id: &str, generation: serde_json::Value) -> Result<bool>;
}
