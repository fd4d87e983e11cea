//! Conversation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_conversation_id;

/// A conversation shared by the user and a set of participants.
///
/// `participant_ids` remembers everyone who has ever been in the conversation;
/// only `active_participant_ids` are scheduling candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub participant_ids: Vec<String>,
    pub active_participant_ids: Vec<String>,
    pub message_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with the given active participants
    pub fn new(title: impl Into<String>, active: Vec<String>) -> Self {
        let now = Utc::now();
        let title = title.into();
        Self {
            id: generate_conversation_id(),
            title: if title.trim().is_empty() { "New Conversation".to_string() } else { title },
            participant_ids: active.clone(),
            active_participant_ids: active,
            message_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the participant is currently active here
    pub fn is_active(&self, participant_id: &str) -> bool {
        self.active_participant_ids.iter().any(|p| p == participant_id)
    }

    /// Activate a participant, remembering it as a member
    pub fn activate(&mut self, participant_id: &str) {
        if !self.participant_ids.iter().any(|p| p == participant_id) {
            self.participant_ids.push(participant_id.to_string());
        }
        if !self.is_active(participant_id) {
            self.active_participant_ids.push(participant_id.to_string());
        }
        self.touch();
    }

    /// Deactivate a participant; it stays a historical member
    pub fn deactivate(&mut self, participant_id: &str) {
        self.active_participant_ids.retain(|p| p != participant_id);
        self.touch();
    }

    /// Forget a participant entirely (participant deleted)
    pub fn forget(&mut self, participant_id: &str) {
        self.participant_ids.retain(|p| p != participant_id);
        self.deactivate(participant_id);
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation() {
        let c = Conversation::new("Design review", vec!["alpha".into()]);
        assert!(c.id.starts_with("conv-"));
        assert_eq!(c.title, "Design review");
        assert!(c.is_active("alpha"));
        assert!(c.message_ids.is_empty());
    }

    #[test]
    fn test_blank_title_defaults() {
        let c = Conversation::new("  ", vec![]);
        assert_eq!(c.title, "New Conversation");
    }

    #[test]
    fn test_activate_deactivate() {
        let mut c = Conversation::new("t", vec![]);
        c.activate("beta");
        c.activate("beta");
        assert_eq!(c.active_participant_ids, vec!["beta".to_string()]);
        assert_eq!(c.participant_ids, vec!["beta".to_string()]);

        c.deactivate("beta");
        assert!(!c.is_active("beta"));
        assert_eq!(c.participant_ids, vec!["beta".to_string()]);

        c.activate("beta");
        c.forget("beta");
        assert!(c.participant_ids.is_empty());
        assert!(c.active_participant_ids.is_empty());
    }
}
