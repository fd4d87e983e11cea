//! Per-participant affinity state and the per-message update.
//!
//! Each conversation carries one `AffinityBook`: a message counter (the clock
//! driving decay) plus one `AffinityState` per participant. Every message that
//! joins the transcript advances the book by exactly one step:
//! 1. Politeness decays for every participant, including the author
//! 2. Participants named in the content (other than the author) gain their mention boost
//! 3. A participant author resets its mention score and takes its politeness penalty

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Author, Participant};

/// Mutable scheduling scores of one participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AffinityState {
    /// Accumulates when named by another author; reset when the participant speaks
    pub mention_score: f64,

    /// Usually <= 0; decays toward 0 every message
    pub politeness_score: f64,

    /// Counter value at which decay was last applied
    pub last_updated_message_index: u64,

    /// Counter value of the participant's last message
    pub last_spoke_message_index: Option<u64>,
}

impl AffinityState {
    /// Zeroed state anchored at the given counter value
    pub fn new(message_counter: u64) -> Self {
        Self {
            last_updated_message_index: message_counter,
            ..Default::default()
        }
    }
}

/// Politeness decay factor for `elapsed` messages at the given half-life
pub fn decay_factor(elapsed: u64, half_life: f64) -> f64 {
    0.5_f64.powf(elapsed as f64 / half_life.max(1.0))
}

/// Affinity states of all participants in one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffinityBook {
    message_counter: u64,
    states: HashMap<String, AffinityState>,
}

impl AffinityBook {
    /// Empty book at counter 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Book with a zeroed state for each participant
    pub fn with_participants(participants: &[Participant]) -> Self {
        let mut book = Self::new();
        for p in participants {
            book.register(&p.id);
        }
        book
    }

    /// Number of messages applied so far
    pub fn message_counter(&self) -> u64 {
        self.message_counter
    }

    /// State of one participant
    pub fn get(&self, participant_id: &str) -> Option<&AffinityState> {
        self.states.get(participant_id)
    }

    /// Number of tracked participants
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no participant is tracked
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Start tracking a participant.
    ///
    /// The new state is anchored at the current counter so messages it never
    /// witnessed are not counted as decay. Existing state is left alone.
    pub fn register(&mut self, participant_id: &str) {
        let counter = self.message_counter;
        self.states
            .entry(participant_id.to_string())
            .or_insert_with(|| AffinityState::new(counter));
    }

    /// Stop tracking a participant
    pub fn remove(&mut self, participant_id: &str) -> Option<AffinityState> {
        self.states.remove(participant_id)
    }

    /// Compute the book that results from appending one message.
    ///
    /// `self` is left untouched; callers swap the result in.
    pub fn apply_message_update(
        &self,
        participants: &[Participant],
        author: &Author,
        content: &str,
        politeness_decay_multiplier: f64,
    ) -> AffinityBook {
        let next_index = self.message_counter + 1;
        let content_lower = content.to_lowercase();
        let mut next = self.clone();

        for p in participants {
            let state = next
                .states
                .entry(p.id.clone())
                .or_insert_with(|| AffinityState::new(self.message_counter));

            let elapsed = next_index.saturating_sub(state.last_updated_message_index);
            state.politeness_score *= decay_factor(elapsed, p.politeness_half_life) * politeness_decay_multiplier;
            state.last_updated_message_index = next_index;

            if author.is_participant(&p.id) {
                state.mention_score = 0.0;
                state.politeness_score -= p.politeness_penalty;
                state.last_spoke_message_index = Some(next_index);
            } else if p.mention_key().is_some_and(|key| content_lower.contains(&key)) {
                state.mention_score += p.mention_boost;
            }
        }

        next.message_counter = next_index;
        next
    }

    /// Apply one message in place
    pub fn apply(&mut self, participants: &[Participant], author: &Author, content: &str, multiplier: f64) {
        *self = self.apply_message_update(participants, author, content, multiplier);
    }
}
