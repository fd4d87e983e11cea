//! Crash recovery for interrupted responses.
//!
//! The scheduler keeps its queue and in-flight set in memory only, so a
//! restart loses every admission. What the store still holds are messages
//! left in `streaming`:
//! 1. Participant responses that never completed are marked `error`; their
//!    partial content stays
//! 2. Messages that were only marked `streaming` as the trigger of a turn go
//!    back to `complete`. This covers every human and system message, and
//!    participant replies that had already completed before being chained.

use crate::domain::{Author, MessageStatus};
use crate::error::Result;
use crate::storage::MessageStore;

/// Detail stored on responses cut off by a restart
pub const INTERRUPTED_DETAIL: &str = "interrupted before completion";

/// Statistics about a recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Conversations scanned
    pub conversations: usize,

    /// Participant responses marked as errored
    pub interrupted_responses: usize,

    /// Trigger messages restored to complete
    pub restored_triggers: usize,
}

impl RecoveryStats {
    /// Total number of messages repaired.
    pub fn total(&self) -> usize {
        self.interrupted_responses + self.restored_triggers
    }
}

/// Repair every message left in `streaming` by a previous run.
pub fn recover_interrupted(store: &dyn MessageStore) -> Result<RecoveryStats> {
    let mut stats = RecoveryStats::default();

    for conversation in store.conversations()? {
        stats.conversations += 1;

        for message in store.messages(&conversation.id)? {
            if message.status != MessageStatus::Streaming {
                continue;
            }

            let interrupted = matches!(message.author, Author::Participant(_)) && !message.was_completed();
            if interrupted {
                store.set_message_status(&message.id, MessageStatus::Error, Some(INTERRUPTED_DETAIL.to_string()))?;
                stats.interrupted_responses += 1;
            } else {
                store.set_message_status(&message.id, MessageStatus::Complete, None)?;
                stats.restored_triggers += 1;
            }
        }
    }

    if stats.total() > 0 {
        log::info!(
            "Recovered {} interrupted responses and {} trigger messages",
            stats.interrupted_responses,
            stats.restored_triggers
        );
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conversation, Message};
    use crate::storage::MemoryStore;

    #[test]
    fn test_recover_interrupted() {
        let store = MemoryStore::new();
        let conversation = Conversation::new("c", vec!["alpha".into()]);
        store.create_conversation(&conversation).unwrap();

        let mut trigger = Message::user(&conversation.id, "hi");
        trigger.status = MessageStatus::Streaming;
        let mut partial = Message::streaming_response(&conversation.id, "alpha");
        partial.content = "half".to_string();
        let done = Message::user(&conversation.id, "done");
        for m in [&trigger, &partial, &done] {
            store.append_message(m).unwrap();
        }

        let stats = recover_interrupted(&store).unwrap();
        assert_eq!(
            stats,
            RecoveryStats {
                conversations: 1,
                interrupted_responses: 1,
                restored_triggers: 1,
            }
        );

        let trigger = store.message(&trigger.id).unwrap().unwrap();
        assert_eq!(trigger.status, MessageStatus::Complete);
        let partial = store.message(&partial.id).unwrap().unwrap();
        assert_eq!(partial.status, MessageStatus::Error);
        assert_eq!(partial.status_detail.as_deref(), Some(INTERRUPTED_DETAIL));
        assert_eq!(partial.content, "half");
    }

    #[test]
    fn test_completed_reply_used_as_trigger_is_restored() {
        let store = MemoryStore::new();
        let conversation = Conversation::new("c", vec!["alpha".into()]);
        store.create_conversation(&conversation).unwrap();

        let mut reply = Message::streaming_response(&conversation.id, "alpha");
        reply.content = "finished".to_string();
        reply.set_status(MessageStatus::Complete, None);
        reply.set_status(MessageStatus::Streaming, None);
        let follow_up = Message::streaming_response(&conversation.id, "alpha");
        store.append_message(&reply).unwrap();
        store.append_message(&follow_up).unwrap();

        let stats = recover_interrupted(&store).unwrap();
        assert_eq!(stats.interrupted_responses, 1);
        assert_eq!(stats.restored_triggers, 1);

        let reply = store.message(&reply.id).unwrap().unwrap();
        assert_eq!(reply.status, MessageStatus::Complete);
        assert_eq!(reply.content, "finished");
        assert!(reply.status_detail.is_none());
        let follow_up = store.message(&follow_up.id).unwrap().unwrap();
        assert_eq!(follow_up.status, MessageStatus::Error);
    }

    #[test]
    fn test_recover_nothing() {
        let store = MemoryStore::new();
        let stats = recover_interrupted(&store).unwrap();
        assert_eq!(stats.total(), 0);
    }
}
