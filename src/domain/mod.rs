//! Domain types for Symposium
//!
//! This module contains the records shared by the scheduler, the runner and
//! storage:
//! - Participant: configured persona with model, prompt and scheduling knobs
//! - Message: a transcript entry with author and status
//! - Conversation: membership and message order
//! - QueuedRequest: a pending or in-flight request for a participant response

pub mod conversation;
pub mod message;
pub mod participant;
pub mod request;

pub use conversation::Conversation;
pub use message::{Author, Message, MessageStatus};
pub use participant::{DEFAULT_SYSTEM_PROMPT, Participant};
pub use request::{CandidateAuthor, QueuedRequest, RequestStatus, TriggerSource};
