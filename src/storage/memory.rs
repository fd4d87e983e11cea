//! In-memory store.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::traits::MessageStore;
use crate::domain::{Conversation, Message, MessageStatus};
use crate::error::{Result, SymposiumError};

/// Plain conversation/message maps shared by the in-memory and JSONL stores
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreData {
    pub(crate) conversations: HashMap<String, Conversation>,
    pub(crate) messages: HashMap<String, Message>,
}

impl StoreData {
    pub(crate) fn create_conversation(&mut self, conversation: &Conversation) -> Result<()> {
        if self.conversations.contains_key(&conversation.id) {
            return Err(SymposiumError::Storage(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        self.conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    pub(crate) fn update_conversation(&mut self, conversation: &Conversation) -> Result<()> {
        let slot = self
            .conversations
            .get_mut(&conversation.id)
            .ok_or_else(|| SymposiumError::ConversationNotFound(conversation.id.clone()))?;
        *slot = conversation.clone();
        Ok(())
    }

    /// Remove a conversation; returns the ids of the messages removed with it
    pub(crate) fn delete_conversation(&mut self, id: &str) -> Result<Vec<String>> {
        self.conversations
            .remove(id)
            .ok_or_else(|| SymposiumError::ConversationNotFound(id.to_string()))?;
        let removed: Vec<String> = self
            .messages
            .values()
            .filter(|m| m.conversation_id == id)
            .map(|m| m.id.clone())
            .collect();
        for message_id in &removed {
            self.messages.remove(message_id);
        }
        Ok(removed)
    }

    /// Insert a message and link it into its conversation; returns the updated conversation
    pub(crate) fn append_message(&mut self, message: &Message) -> Result<Conversation> {
        if self.messages.contains_key(&message.id) {
            return Err(SymposiumError::Storage(format!("message {} already exists", message.id)));
        }
        let conversation = self
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| SymposiumError::ConversationNotFound(message.conversation_id.clone()))?;
        conversation.message_ids.push(message.id.clone());
        conversation.touch();
        self.messages.insert(message.id.clone(), message.clone());
        Ok(conversation.clone())
    }

    pub(crate) fn update_message(&mut self, message: &Message) -> Result<()> {
        let slot = self
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| SymposiumError::MessageNotFound(message.id.clone()))?;
        *slot = message.clone();
        Ok(())
    }

    /// Edit a stored message in place; None if it does not exist
    pub(crate) fn edit_message(&mut self, id: &str, edit: impl FnOnce(&mut Message)) -> Option<Message> {
        let message = self.messages.get_mut(id)?;
        edit(message);
        Some(message.clone())
    }

    pub(crate) fn conversations_sorted(&self) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self.conversations.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub(crate) fn transcript(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversation = self
            .conversations
            .get(conversation_id)
            .ok_or_else(|| SymposiumError::ConversationNotFound(conversation_id.to_string()))?;
        Ok(conversation
            .message_ids
            .iter()
            .filter_map(|id| self.messages.get(id).cloned())
            .collect())
    }
}

/// Volatile store; everything is lost on drop
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryStore {
    fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.data.write().create_conversation(conversation)
    }

    fn conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.data.read().conversations.get(id).cloned())
    }

    fn conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.data.read().conversations_sorted())
    }

    fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.data.write().update_conversation(conversation)
    }

    fn delete_conversation(&self, id: &str) -> Result<()> {
        self.data.write().delete_conversation(id).map(|_| ())
    }

    fn append_message(&self, message: &Message) -> Result<()> {
        self.data.write().append_message(message).map(|_| ())
    }

    fn message(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.data.read().messages.get(id).cloned())
    }

    fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.data.read().transcript(conversation_id)
    }

    fn update_message(&self, message: &Message) -> Result<()> {
        self.data.write().update_message(message)
    }

    fn set_message_status(&self, id: &str, status: MessageStatus, detail: Option<String>) -> Result<Option<Message>> {
        Ok(self.data.write().edit_message(id, |m| m.set_status(status, detail)))
    }

    fn attach_generation(&self, id: &str, generation: serde_json::Value) -> Result<bool> {
        let attached = self.data.write().edit_message(id, |m| {
            m.generation = Some(generation);
            m.touch();
        });
        Ok(attached.is_some())
    }
}
