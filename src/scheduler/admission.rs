//! Scheduling pass: fill free slots from the queue.
//!
//! The pass is a pure function of the queue, the participants, the affinity
//! books and the in-flight set. It never touches storage; the caller applies
//! the result atomically.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::domain::{CandidateAuthor, Participant, QueuedRequest, RequestStatus};
use crate::scheduler::affinity::AffinityBook;
use crate::scheduler::logits::calculate_logits;
use crate::scheduler::sampling::{RandomSource, safe_temperature, sample_index};
use crate::scheduler::settings::SchedulerSettings;

/// Why a request left the queue without being admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The request's conversation no longer exists
    MissingConversation,
    /// Sampling produced no selection (no active, known candidate)
    NoCandidates,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingConversation => write!(f, "conversation no longer exists"),
            DropReason::NoCandidates => write!(f, "no eligible participant"),
        }
    }
}

/// Read-only view the pass schedules against
#[derive(Debug, Clone, Copy)]
pub struct SchedulingContext<'a> {
    /// Registered participants
    pub participants: &'a [Participant],

    /// Affinity book per conversation id
    pub affinity: &'a HashMap<String, AffinityBook>,

    /// Active participant ids per existing conversation id
    pub rosters: &'a HashMap<String, Vec<String>>,
}

impl SchedulingContext<'_> {
    /// Candidate ids for a request, or None if its conversation is gone
    fn candidates(&self, request: &QueuedRequest) -> Option<Vec<String>> {
        let roster = self.rosters.get(&request.conversation_id)?;
        let pool = match &request.candidate {
            CandidateAuthor::PendingTurn => roster.clone(),
            CandidateAuthor::Participant(id) => roster.iter().filter(|p| *p == id).cloned().collect(),
        };
        Some(pool)
    }
}

/// Result of one pass
#[derive(Debug, Clone, Default)]
pub struct Admission {
    /// Requests bound to a participant and marked in-flight
    pub admitted: Vec<QueuedRequest>,
    /// Requests removed without admission
    pub dropped: Vec<(QueuedRequest, DropReason)>,
    /// Everything else, in original order
    pub remaining: Vec<QueuedRequest>,
}

impl Admission {
    fn unchanged(queue: Vec<QueuedRequest>) -> Self {
        Self {
            remaining: queue,
            ..Default::default()
        }
    }

    fn reject(&mut self, mut request: QueuedRequest, reason: DropReason) {
        request.status = RequestStatus::Error;
        request.error = Some(reason.to_string());
        self.dropped.push((request, reason));
    }
}

/// Run one scheduling pass.
///
/// - Free slots are `max_concurrent - in_flight`; none means nothing changes.
/// - Requests the pacing mode defers stay queued.
/// - Eligible requests are taken FIFO; each samples a participant from its
///   conversation's active set. Dropped requests do not use up a slot.
/// - Ids already in flight are never admitted again.
pub fn schedule(
    queue: Vec<QueuedRequest>,
    ctx: &SchedulingContext<'_>,
    in_flight: &HashSet<String>,
    settings: &SchedulerSettings,
    rng: &mut dyn RandomSource,
) -> Admission {
    let slots = settings.max_concurrent.saturating_sub(in_flight.len());
    if slots == 0 {
        return Admission::unchanged(queue);
    }

    let pacing = settings.response_pacing;
    let is_eligible = |r: &QueuedRequest| pacing.admits(r.trigger) && !in_flight.contains(&r.id);
    if !queue.iter().any(&is_eligible) {
        return Admission::unchanged(queue);
    }

    let temperature = safe_temperature(settings.selection_temperature);
    let empty_book = AffinityBook::new();
    let mut admission = Admission::default();

    for mut request in queue {
        if admission.admitted.len() >= slots || !is_eligible(&request) {
            admission.remaining.push(request);
            continue;
        }

        let Some(candidates) = ctx.candidates(&request) else {
            admission.reject(request, DropReason::MissingConversation);
            continue;
        };

        let book = ctx.affinity.get(&request.conversation_id).unwrap_or(&empty_book);
        let logits = calculate_logits(&candidates, ctx.participants, book);

        match sample_index(&logits, temperature, rng) {
            Some(index) => {
                request.candidate = CandidateAuthor::Participant(candidates[index].clone());
                request.status = RequestStatus::InFlight;
                admission.admitted.push(request);
            }
            None => admission.reject(request, DropReason::NoCandidates),
        }
    }

    admission
}
