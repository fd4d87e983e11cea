//! Scheduler state: participants, affinity books, queue and in-flight set.
//!
//! All mutation goes through `&mut self` methods; the manager keeps one
//! instance behind a single lock so affinity updates and admission are
//! serialized.

use std::collections::{HashMap, HashSet};

use crate::domain::{CandidateAuthor, Message, Participant, QueuedRequest, RequestStatus, TriggerSource};
use crate::error::{Result, SymposiumError};
use crate::scheduler::admission::{Admission, SchedulingContext, schedule};
use crate::scheduler::affinity::AffinityBook;
use crate::scheduler::logits::calculate_logits;
use crate::scheduler::sampling::{RandomSource, probabilities};
use crate::scheduler::settings::SchedulerSettings;

#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    settings: SchedulerSettings,
    participants: Vec<Participant>,
    affinity: HashMap<String, AffinityBook>,
    queue: Vec<QueuedRequest>,
    in_flight: HashMap<String, QueuedRequest>,
}

impl SchedulerState {
    pub fn new(settings: SchedulerSettings, participants: Vec<Participant>) -> Self {
        Self {
            settings,
            participants,
            ..Default::default()
        }
    }

    //=== Settings ===

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SchedulerSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    //=== Participants ===

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Register a participant with a zeroed affinity state in every conversation
    pub fn add_participant(&mut self, participant: Participant) -> Result<()> {
        if self.participant(&participant.id).is_some() {
            return Err(SymposiumError::InvalidState(format!(
                "participant {} already exists",
                participant.id
            )));
        }
        for book in self.affinity.values_mut() {
            book.register(&participant.id);
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Replace a participant's config, keeping its affinity state
    pub fn update_participant(&mut self, participant: Participant) -> Result<()> {
        let slot = self
            .participants
            .iter_mut()
            .find(|p| p.id == participant.id)
            .ok_or_else(|| SymposiumError::ParticipantNotFound(participant.id.clone()))?;
        *slot = participant;
        Ok(())
    }

    /// Forget a participant and its affinity state everywhere
    pub fn remove_participant(&mut self, id: &str) -> Result<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SymposiumError::ParticipantNotFound(id.to_string()))?;
        for book in self.affinity.values_mut() {
            book.remove(id);
        }
        Ok(self.participants.remove(index))
    }

    //=== Affinity ===

    pub fn affinity(&self, conversation_id: &str) -> Option<&AffinityBook> {
        self.affinity.get(conversation_id)
    }

    /// Advance the conversation's affinity book by one message
    pub fn record_message(&mut self, message: &Message) {
        let multiplier = self.settings.politeness_decay_multiplier;
        let participants = &self.participants;
        let book = self
            .affinity
            .entry(message.conversation_id.clone())
            .or_insert_with(|| AffinityBook::with_participants(participants));
        book.apply(participants, &message.author, &message.content, multiplier);
    }

    /// Logits for candidates in a conversation (zero state if it has none yet)
    pub fn logits(&self, conversation_id: &str, candidates: &[String]) -> Vec<f64> {
        match self.affinity.get(conversation_id) {
            Some(book) => calculate_logits(candidates, &self.participants, book),
            None => calculate_logits(candidates, &self.participants, &AffinityBook::new()),
        }
    }

    /// Selection probabilities at the configured temperature
    pub fn probabilities(&self, conversation_id: &str, candidates: &[String]) -> Vec<f64> {
        probabilities(&self.logits(conversation_id, candidates), self.settings.selection_temperature)
    }

    /// Drop a conversation's affinity book and queued requests.
    /// Returns the removed queued requests.
    pub fn remove_conversation(&mut self, conversation_id: &str) -> Vec<QueuedRequest> {
        self.affinity.remove(conversation_id);
        let (removed, kept) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|r| r.conversation_id == conversation_id);
        self.queue = kept;
        removed
    }

    //=== Queue ===

    pub fn queue(&self) -> &[QueuedRequest] {
        &self.queue
    }

    /// Queue a request. An open chained turn (participant trigger, no
    /// addressee) replaces any older one queued for the same conversation.
    pub fn enqueue(&mut self, mut request: QueuedRequest) {
        request.status = RequestStatus::Queued;
        if is_chained_turn(&request) {
            let before = self.queue.len();
            self.queue
                .retain(|r| r.conversation_id != request.conversation_id || !is_chained_turn(r));
            let superseded = before - self.queue.len();
            if superseded > 0 {
                tracing::debug!(
                    conversation_id = %request.conversation_id,
                    superseded,
                    "Replaced queued chained turn"
                );
            }
        }
        self.queue.push(request);
    }

    pub fn remove_queued(&mut self, request_id: &str) -> Option<QueuedRequest> {
        let index = self.queue.iter().position(|r| r.id == request_id)?;
        Some(self.queue.remove(index))
    }

    /// Conversation ids with queued requests
    pub fn queued_conversations(&self) -> HashSet<String> {
        self.queue.iter().map(|r| r.conversation_id.clone()).collect()
    }

    //=== In flight ===

    pub fn in_flight(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.in_flight.values()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, request_id: &str) -> bool {
        self.in_flight.contains_key(request_id)
    }

    pub fn in_flight_request(&self, request_id: &str) -> Option<&QueuedRequest> {
        self.in_flight.get(request_id)
    }

    /// Record the response message created for an in-flight request
    pub fn set_response_message(&mut self, request_id: &str, message_id: &str) -> Result<()> {
        let request = self
            .in_flight
            .get_mut(request_id)
            .ok_or_else(|| SymposiumError::RequestNotFound(request_id.to_string()))?;
        request.response_message_id = Some(message_id.to_string());
        Ok(())
    }

    /// Remove a request from the in-flight set, freeing its slot
    pub fn finish(&mut self, request_id: &str) -> Option<QueuedRequest> {
        self.in_flight.remove(request_id)
    }

    /// Run one scheduling pass and apply it: admitted requests move from the
    /// queue to the in-flight set, dropped ones are discarded.
    pub fn admit(&mut self, rosters: &HashMap<String, Vec<String>>, rng: &mut dyn RandomSource) -> Admission {
        let in_flight: HashSet<String> = self.in_flight.keys().cloned().collect();
        let ctx = SchedulingContext {
            participants: &self.participants,
            affinity: &self.affinity,
            rosters,
        };

        let queue = std::mem::take(&mut self.queue);
        let admission = schedule(queue, &ctx, &in_flight, &self.settings, rng);

        self.queue = admission.remaining.clone();
        for request in &admission.admitted {
            self.in_flight.insert(request.id.clone(), request.clone());
        }

        admission
    }
}

fn is_chained_turn(request: &QueuedRequest) -> bool {
    request.trigger == TriggerSource::Participant && request.candidate == CandidateAuthor::PendingTurn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Author;
    use crate::scheduler::sampling::Argmax;

    fn state() -> SchedulerState {
        SchedulerState::new(
            SchedulerSettings::default(),
            vec![
                Participant::new("alpha", "Alpha").with_eagerness(0.6),
                Participant::new("beta", "Beta").with_eagerness(0.4),
            ],
        )
    }

    fn rosters(conversation: &str) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        map.insert(conversation.to_string(), vec!["alpha".to_string(), "beta".to_string()]);
        map
    }

    #[test]
    fn test_record_message_creates_book() {
        let mut state = state();
        state.record_message(&Message::user("c1", "hello Beta"));

        let book = state.affinity("c1").unwrap();
        assert_eq!(book.message_counter(), 1);
        assert_eq!(book.get("beta").unwrap().mention_score, 1.0);
        assert_eq!(state.logits("c1", &["alpha".to_string(), "beta".to_string()]), vec![0.6, 1.4]);
    }

    #[test]
    fn test_add_participant_anchors_at_counter() {
        let mut state = state();
        state.record_message(&Message::user("c1", "one"));
        state.record_message(&Message::user("c1", "two"));

        state.add_participant(Participant::new("gamma", "Gamma")).unwrap();
        let gamma = state.affinity("c1").unwrap().get("gamma").unwrap();
        assert_eq!(gamma.last_updated_message_index, 2);

        assert!(state.add_participant(Participant::new("gamma", "Gamma")).is_err());
    }

    #[test]
    fn test_update_participant_keeps_state() {
        let mut state = state();
        state.record_message(&Message::user("c1", "Beta!"));

        let updated = Participant::new("beta", "Beta").with_eagerness(0.9);
        state.update_participant(updated).unwrap();
        assert_eq!(state.participant("beta").unwrap().eagerness, 0.9);
        assert_eq!(state.affinity("c1").unwrap().get("beta").unwrap().mention_score, 1.0);

        assert!(matches!(
            state.update_participant(Participant::new("nobody", "N")),
            Err(SymposiumError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn test_remove_participant_drops_state() {
        let mut state = state();
        state.record_message(&Message::user("c1", "hi"));
        state.remove_participant("alpha").unwrap();
        assert!(state.participant("alpha").is_none());
        assert!(state.affinity("c1").unwrap().get("alpha").is_none());
        assert_eq!(state.logits("c1", &["alpha".to_string()]), vec![f64::NEG_INFINITY]);
    }

    #[test]
    fn test_admit_moves_requests_to_in_flight() {
        let mut state = state();
        state.enqueue(QueuedRequest::pending_turn("c1", "m1", TriggerSource::User));
        state.enqueue(QueuedRequest::pending_turn("c1", "m2", TriggerSource::User));
        state.enqueue(QueuedRequest::pending_turn("c1", "m3", TriggerSource::User));

        let admission = state.admit(&rosters("c1"), &mut Argmax);

        assert_eq!(admission.admitted.len(), 2);
        assert_eq!(state.in_flight_count(), 2);
        assert_eq!(state.queue().len(), 1);
        for r in &admission.admitted {
            assert!(state.is_in_flight(&r.id));
        }

        // no free slots now
        let again = state.admit(&rosters("c1"), &mut Argmax);
        assert!(again.admitted.is_empty());
        assert_eq!(state.queue().len(), 1);

        // finishing one frees a slot
        let id = admission.admitted[0].id.clone();
        assert!(state.finish(&id).is_some());
        let third = state.admit(&rosters("c1"), &mut Argmax);
        assert_eq!(third.admitted.len(), 1);
        assert!(state.queue().is_empty());
    }

    #[test]
    fn test_chained_turn_keeps_only_newest() {
        let mut state = state();
        state.enqueue(QueuedRequest::pending_turn("c1", "r1", TriggerSource::Participant));
        state.enqueue(QueuedRequest::pending_turn("c1", "u1", TriggerSource::User));
        state.enqueue(QueuedRequest::addressed_to("c1", "r1", TriggerSource::Participant, "beta"));
        state.enqueue(QueuedRequest::pending_turn("c2", "x1", TriggerSource::Participant));
        state.enqueue(QueuedRequest::pending_turn("c1", "r2", TriggerSource::Participant));

        let triggers: Vec<&str> = state.queue().iter().map(|r| r.trigger_message_id.as_str()).collect();
        assert_eq!(triggers, vec!["u1", "r1", "x1", "r2"]);
        assert_eq!(state.queue()[1].participant_id(), Some("beta"));
    }

    #[test]
    fn test_set_response_message() {
        let mut state = state();
        state.enqueue(QueuedRequest::pending_turn("c1", "m1", TriggerSource::User));
        let admitted = state.admit(&rosters("c1"), &mut Argmax).admitted;
        let id = admitted[0].id.clone();

        state.set_response_message(&id, "msg-r").unwrap();
        assert_eq!(
            state.in_flight_request(&id).unwrap().response_message_id.as_deref(),
            Some("msg-r")
        );
        assert!(state.set_response_message("missing", "x").is_err());
    }

    #[test]
    fn test_remove_conversation() {
        let mut state = state();
        state.record_message(&Message::user("c1", "hi"));
        state.enqueue(QueuedRequest::pending_turn("c1", "m1", TriggerSource::User));
        state.enqueue(QueuedRequest::pending_turn("c2", "m2", TriggerSource::User));

        let removed = state.remove_conversation("c1");
        assert_eq!(removed.len(), 1);
        assert_eq!(state.queue().len(), 1);
        assert!(state.affinity("c1").is_none());
    }

    #[test]
    fn test_participant_message_penalizes_author() {
        let mut state = state();
        let mut msg = Message::streaming_response("c1", "alpha");
        msg.content = "Beta, over to you".to_string();
        state.record_message(&msg);

        let book = state.affinity("c1").unwrap();
        assert!((book.get("alpha").unwrap().politeness_score + 0.2).abs() < 1e-12);
        assert_eq!(book.get("beta").unwrap().mention_score, 1.0);
        assert_eq!(msg.author, Author::Participant("alpha".into()));
    }

    #[test]
    fn test_set_settings_validates() {
        let mut state = state();
        assert!(state.set_settings(SchedulerSettings::default().with_max_concurrent(0)).is_err());
        assert!(state.set_settings(SchedulerSettings::default().with_max_concurrent(5)).is_ok());
        assert_eq!(state.settings().max_concurrent, 5);
    }
}
