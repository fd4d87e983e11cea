//! Logit calculation: eagerness + mention + politeness.

use crate::domain::Participant;
use crate::scheduler::affinity::{AffinityBook, AffinityState};

/// Logit of one participant given its state
pub fn participant_logit(participant: &Participant, state: Option<&AffinityState>) -> f64 {
    let state = state.copied().unwrap_or_default();
    participant.eagerness + state.mention_score + state.politeness_score
}

/// One logit per candidate id, in candidate order.
///
/// Candidates without a participant config get negative infinity, which the
/// sampler turns into zero probability.
pub fn calculate_logits<S: AsRef<str>>(candidates: &[S], participants: &[Participant], affinity: &AffinityBook) -> Vec<f64> {
    candidates
        .iter()
        .map(|id| {
            let id = id.as_ref();
            match participants.iter().find(|p| p.id == id) {
                Some(p) => participant_logit(p, affinity.get(id)),
                None => f64::NEG_INFINITY,
            }
        })
        .collect()
}
