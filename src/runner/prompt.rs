//! Prompt assembly for a participant turn.
//!
//! The transcript is mapped onto generic chat roles: the human is `user`,
//! personas are `assistant` tagged with their display name, and system
//! notices stay `system`. The responding participant's system prompt goes
//! first.

use crate::domain::{Author, Message, MessageStatus, Participant};
use crate::provider::ChatMessage;

/// Build the prompt for `participant` from `history`.
///
/// `history` must already be cut off at the triggering message. Errored,
/// cancelled and empty messages are left out.
pub fn build_prompt(participant: &Participant, history: &[Message], participants: &[Participant]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(participant.system_prompt()));

    for message in history {
        if matches!(message.status, MessageStatus::Error | MessageStatus::Cancelled) {
            continue;
        }
        if message.content.trim().is_empty() {
            continue;
        }

        let mapped = match &message.author {
            Author::User => ChatMessage::user(&message.content),
            Author::System => ChatMessage::system(&message.content),
            Author::Participant(id) => {
                let name = participants
                    .iter()
                    .find(|p| &p.id == id)
                    .map(|p| p.name.as_str())
                    .unwrap_or(id.as_str());
                ChatMessage::assistant(&message.content, name)
            }
        };
        messages.push(mapped);
    }

    messages
}

/// Slice of `transcript` up to and including `trigger_id`
pub fn history_until<'a>(transcript: &'a [Message], trigger_id: &str) -> Option<&'a [Message]> {
    let index = transcript.iter().position(|m| m.id == trigger_id)?;
    Some(&transcript[..=index])
}
