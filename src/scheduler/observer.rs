//! Observability hook for scheduling decisions.
//!
//! The scheduler reports admissions, drops and finished requests to a
//! `SchedulerObserver`. `LogObserver` turns them into tracing events; callers
//! can plug in metrics or test recorders instead.

use crate::domain::QueuedRequest;
use crate::scheduler::admission::DropReason;

/// How an admitted request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Response message completed
    Complete,
    /// Provider or reference failure, with detail
    Error(String),
    /// Cancelled while queued or in flight
    Cancelled,
}

/// Receives scheduler events. Every method defaults to a no-op.
pub trait SchedulerObserver: Send + Sync {
    fn on_admitted(&self, _request: &QueuedRequest) {}

    fn on_dropped(&self, _request: &QueuedRequest, _reason: DropReason) {}

    fn on_finished(&self, _request: &QueuedRequest, _outcome: &RequestOutcome) {}
}

/// Default observer: structured log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SchedulerObserver for LogObserver {
    fn on_admitted(&self, request: &QueuedRequest) {
        tracing::info!(
            request_id = %request.id,
            conversation_id = %request.conversation_id,
            participant_id = request.participant_id().unwrap_or("-"),
            "Request admitted"
        );
    }

    fn on_dropped(&self, request: &QueuedRequest, reason: DropReason) {
        tracing::warn!(
            request_id = %request.id,
            conversation_id = %request.conversation_id,
            reason = %reason,
            "Request dropped"
        );
    }

    fn on_finished(&self, request: &QueuedRequest, outcome: &RequestOutcome) {
        match outcome {
            RequestOutcome::Complete => {
                tracing::info!(request_id = %request.id, "Request complete");
            }
            RequestOutcome::Error(error) => {
                tracing::error!(request_id = %request.id, error = %error, "Request failed");
            }
            RequestOutcome::Cancelled => {
                tracing::info!(request_id = %request.id, "Request cancelled");
            }
        }
    }
}
