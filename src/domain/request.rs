//! Queued response requests
//!
//! A request asks "someone should respond to this message". It starts as a
//! pending turn and the scheduler binds it to a concrete participant when it
//! is admitted.

use serde::{Deserialize, Serialize};

use crate::id::{generate_request_id, now_ms};

/// Who a request is for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CandidateAuthor {
    /// Any active participant; the scheduler picks one
    PendingTurn,
    /// A specific participant, by id
    Participant(String),
}

impl CandidateAuthor {
    /// Bound participant id, if any
    pub fn participant_id(&self) -> Option<&str> {
        match self {
            CandidateAuthor::Participant(id) => Some(id),
            CandidateAuthor::PendingTurn => None,
        }
    }
}

/// What caused the request to be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// A human message
    User,
    /// A participant finished responding (chained turn)
    Participant,
    /// A system notice
    System,
    /// Synthetic idle nudge
    Timer,
}

/// Lifecycle status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    InFlight,
    Error,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Queued => write!(f, "queued"),
            RequestStatus::InFlight => write!(f, "in-flight"),
            RequestStatus::Error => write!(f, "error"),
        }
    }
}

/// A request for a participant response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub conversation_id: String,
    pub candidate: CandidateAuthor,
    pub trigger_message_id: String,
    pub trigger: TriggerSource,

    /// Assigned once generation starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_message_id: Option<String>,

    /// Milliseconds since epoch
    pub enqueued_at: u64,
    pub status: RequestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueuedRequest {
    /// A pending turn: any active participant may answer
    pub fn pending_turn(conversation_id: impl Into<String>, trigger_message_id: impl Into<String>, trigger: TriggerSource) -> Self {
        Self {
            id: generate_request_id(),
            conversation_id: conversation_id.into(),
            candidate: CandidateAuthor::PendingTurn,
            trigger_message_id: trigger_message_id.into(),
            trigger,
            response_message_id: None,
            enqueued_at: now_ms(),
            status: RequestStatus::Queued,
            error: None,
        }
    }

    /// A request addressed to one participant
    pub fn addressed_to(
        conversation_id: impl Into<String>,
        trigger_message_id: impl Into<String>,
        trigger: TriggerSource,
        participant_id: impl Into<String>,
    ) -> Self {
        Self {
            candidate: CandidateAuthor::Participant(participant_id.into()),
            ..Self::pending_turn(conversation_id, trigger_message_id, trigger)
        }
    }

    /// Participant bound to this request, if admitted or addressed
    pub fn participant_id(&self) -> Option<&str> {
        self.candidate.participant_id()
    }
}
