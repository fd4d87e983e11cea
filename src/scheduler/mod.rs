//! Scheduler module for participant turn-taking.
//!
//! This module provides:
//! - **Affinity**: per-conversation mention and politeness scores, advanced once per message.
//! - **Logits and sampling**: additive scoring and temperature-scaled softmax selection.
//! - **Pacing**: which trigger sources are eligible for admission.
//! - **Admission**: fills free concurrency slots from the queue.
//! - **ConversationScheduler**: the event-driven loop that spawns request runners.
//!
//! # Architecture
//!
//! 1. A message append advances the conversation's affinity book and queues a request
//! 2. A tick filters the queue by pacing and samples a participant per request
//! 3. Admitted requests run concurrently, up to `max_concurrent`
//! 4. A completed response is itself appended, which queues the next turn
//!
//! # Example
//!
//! ```ignore
//! use symposium::scheduler::ConversationScheduler;
//! use symposium::storage::MemoryStore;
//!
//! let scheduler = ConversationScheduler::builder(Arc::new(MemoryStore::new()), provider)
//!     .participants(participants)
//!     .build()?;
//! let conversation = scheduler.create_conversation("Standup", vec!["alpha".into()])?;
//! scheduler.submit_user_message(&conversation.id, "Morning Alpha")?;
//! scheduler.run_until_idle().await;
//! ```

pub mod admission;
pub mod affinity;
pub mod logits;
pub(crate) mod manager;
pub mod observer;
pub mod pacing;
pub mod sampling;
pub mod settings;
pub mod state;

pub use admission::{Admission, DropReason, SchedulingContext, schedule};
pub use affinity::{AffinityBook, AffinityState, decay_factor};
pub use logits::{calculate_logits, participant_logit};
pub use manager::{ConversationScheduler, SchedulerBuilder, SchedulerEvent};
pub use observer::{LogObserver, RequestOutcome, SchedulerObserver};
pub use pacing::{ResponsePacing, filter_by_pacing};
pub use sampling::{
    Argmax, FixedDraw, MIN_SELECTION_TEMPERATURE, RandomSource, entropy, inverse_cdf, probabilities, safe_temperature,
    sample_index, seeded,
};
pub use settings::SchedulerSettings;
pub use state::SchedulerState;
