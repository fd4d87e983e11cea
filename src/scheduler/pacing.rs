//! Pacing filter: which queued requests are eligible in a scheduling pass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{QueuedRequest, TriggerSource};

/// How eagerly participants respond
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePacing {
    /// Only reply to the human
    Relaxed,
    /// Reply to the human and to each other, ignore idle nudges
    #[default]
    Steady,
    /// Everything is eligible
    Quick,
}

impl ResponsePacing {
    /// Whether a request with this trigger may be scheduled
    pub fn admits(&self, trigger: TriggerSource) -> bool {
        match self {
            ResponsePacing::Relaxed => trigger == TriggerSource::User,
            ResponsePacing::Steady => trigger != TriggerSource::Timer,
            ResponsePacing::Quick => true,
        }
    }
}

impl fmt::Display for ResponsePacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponsePacing::Relaxed => write!(f, "relaxed"),
            ResponsePacing::Steady => write!(f, "steady"),
            ResponsePacing::Quick => write!(f, "quick"),
        }
    }
}

impl FromStr for ResponsePacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relaxed" => Ok(ResponsePacing::Relaxed),
            "steady" => Ok(ResponsePacing::Steady),
            "quick" => Ok(ResponsePacing::Quick),
            other => Err(format!("unknown pacing '{}'", other)),
        }
    }
}

/// Requests eligible under `pacing`, in queue order.
///
/// The input queue is not consumed; deferred requests stay where they are.
pub fn filter_by_pacing(queue: &[QueuedRequest], pacing: ResponsePacing) -> Vec<QueuedRequest> {
    queue.iter().filter(|r| pacing.admits(r.trigger)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Vec<QueuedRequest> {
        vec![
            QueuedRequest::pending_turn("c", "m1", TriggerSource::User),
            QueuedRequest::pending_turn("c", "m2", TriggerSource::Participant),
            QueuedRequest::pending_turn("c", "m3", TriggerSource::Timer),
            QueuedRequest::pending_turn("c", "m4", TriggerSource::System),
        ]
    }

    fn triggers(requests: &[QueuedRequest]) -> Vec<&str> {
        requests.iter().map(|r| r.trigger_message_id.as_str()).collect()
    }

    #[test]
    fn test_relaxed_keeps_only_user_triggers() {
        let filtered = filter_by_pacing(&queue(), ResponsePacing::Relaxed);
        assert_eq!(triggers(&filtered), vec!["m1"]);
    }

    #[test]
    fn test_steady_drops_timer_triggers() {
        let filtered = filter_by_pacing(&queue(), ResponsePacing::Steady);
        assert_eq!(triggers(&filtered), vec!["m1", "m2", "m4"]);
    }

    #[test]
    fn test_quick_keeps_everything() {
        let filtered = filter_by_pacing(&queue(), ResponsePacing::Quick);
        assert_eq!(filtered.len(), 4);
    }

    #[test]
    fn test_pacing_parse_and_display() {
        assert_eq!("Relaxed".parse::<ResponsePacing>().unwrap(), ResponsePacing::Relaxed);
        assert_eq!(ResponsePacing::Quick.to_string(), "quick");
        assert!("eager".parse::<ResponsePacing>().is_err());
        assert_eq!(ResponsePacing::default(), ResponsePacing::Steady);
    }
}
