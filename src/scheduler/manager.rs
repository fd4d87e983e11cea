//! Conversation scheduler: the single logical scheduling loop.
//!
//! The `ConversationScheduler`:
//! 1. Appends messages and advances affinity state in append order
//! 2. Enqueues response requests for them
//! 3. On each tick, admits requests into free slots and spawns a runner per admission
//! 4. Reaps finished runners, handles cancellation and shutdown
//!
//! All scheduler state sits behind one lock. Store writes that must agree
//! with it happen while the lock is held; nothing awaits with it held.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{Conversation, Message, MessageStatus, Participant, QueuedRequest, TriggerSource};
use crate::error::{Result, SymposiumError};
use crate::provider::CompletionProvider;
use crate::runner::{RequestRunner, RunnerConfig};
use crate::scheduler::admission::{Admission, DropReason};
use crate::scheduler::observer::{LogObserver, RequestOutcome, SchedulerObserver};
use crate::scheduler::sampling::{RandomSource, entropy};
use crate::scheduler::settings::SchedulerSettings;
use crate::scheduler::state::SchedulerState;
use crate::storage::MessageStore;

const IDLE_POLL: Duration = Duration::from_millis(5);

/// Event that wakes the scheduling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A message joined a conversation and a request was queued for it
    MessageAppended { conversation_id: String },
    /// A request left the in-flight set (completed, failed or cancelled)
    RequestFinished { request_id: String },
    /// Settings were replaced
    SettingsChanged,
    /// Stop the loop
    Shutdown,
}

/// State shared between the scheduler handle and its runners.
pub(crate) struct Shared {
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) provider: Arc<dyn CompletionProvider>,
    pub(crate) observer: Arc<dyn SchedulerObserver>,
    pub(crate) runner: RunnerConfig,
    /// Detached metadata lookups
    pub(crate) background: Mutex<Vec<JoinHandle<()>>>,
    rng: Mutex<Box<dyn RandomSource>>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    events: mpsc::UnboundedSender<SchedulerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SchedulerEvent>>>,
}

impl Shared {
    pub(crate) fn notify(&self, event: SchedulerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Scheduler event dropped, loop not listening");
        }
    }
}

/// Builder for `ConversationScheduler`.
pub struct SchedulerBuilder {
    store: Arc<dyn MessageStore>,
    provider: Arc<dyn CompletionProvider>,
    settings: SchedulerSettings,
    participants: Vec<Participant>,
    observer: Arc<dyn SchedulerObserver>,
    rng: Option<Box<dyn RandomSource>>,
    runner: RunnerConfig,
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn MessageStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            store,
            provider,
            settings: SchedulerSettings::default(),
            participants: Vec::new(),
            observer: Arc::new(LogObserver),
            rng: None,
            runner: RunnerConfig::default(),
        }
    }

    pub fn settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn participants(mut self, participants: Vec<Participant>) -> Self {
        self.participants = participants;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SchedulerObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Randomness used for participant selection (OS-seeded by default)
    pub fn random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn runner_config(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Validate settings and participants, then build the scheduler.
    pub fn build(self) -> Result<ConversationScheduler> {
        self.settings.validate()?;

        let mut state = SchedulerState::new(self.settings, Vec::new());
        for participant in self.participants {
            state.add_participant(participant)?;
        }

        let (events, events_rx) = mpsc::unbounded_channel();
        let rng = self.rng.unwrap_or_else(|| Box::new(entropy()) as Box<dyn RandomSource>);

        Ok(ConversationScheduler {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                store: self.store,
                provider: self.provider,
                observer: self.observer,
                runner: self.runner,
                background: Mutex::new(Vec::new()),
                rng: Mutex::new(rng),
                tasks: Mutex::new(HashMap::new()),
                events,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        })
    }
}

/// Schedules participant responses across conversations.
///
/// Cheap to clone; clones share the same state, so one clone can drive
/// `run()` while others submit messages.
#[derive(Clone)]
pub struct ConversationScheduler {
    shared: Arc<Shared>,
}

impl ConversationScheduler {
    pub fn builder(store: Arc<dyn MessageStore>, provider: Arc<dyn CompletionProvider>) -> SchedulerBuilder {
        SchedulerBuilder::new(store, provider)
    }

    pub fn store(&self) -> Arc<dyn MessageStore> {
        self.shared.store.clone()
    }

    //=== Settings ===

    pub fn settings(&self) -> SchedulerSettings {
        self.shared.state.lock().settings().clone()
    }

    /// Replace settings. Takes effect on the next tick.
    pub fn update_settings(&self, settings: SchedulerSettings) -> Result<()> {
        self.shared.state.lock().set_settings(settings)?;
        self.shared.notify(SchedulerEvent::SettingsChanged);
        Ok(())
    }

    //=== Participants ===

    pub fn participants(&self) -> Vec<Participant> {
        self.shared.state.lock().participants().to_vec()
    }

    pub fn add_participant(&self, participant: Participant) -> Result<()> {
        tracing::info!(participant_id = %participant.id, "Adding participant");
        self.shared.state.lock().add_participant(participant)
    }

    pub fn update_participant(&self, participant: Participant) -> Result<()> {
        self.shared.state.lock().update_participant(participant)
    }

    /// Remove a participant and take it out of every conversation.
    pub fn remove_participant(&self, participant_id: &str) -> Result<Participant> {
        let mut state = self.shared.state.lock();
        let removed = state.remove_participant(participant_id)?;

        for mut conversation in self.shared.store.conversations()? {
            if conversation.participant_ids.iter().any(|id| id == participant_id) {
                conversation.forget(participant_id);
                self.shared.store.update_conversation(&conversation)?;
            }
        }

        tracing::info!(participant_id, "Removed participant");
        Ok(removed)
    }

    //=== Conversations ===

    /// Create a conversation with the given active participants.
    pub fn create_conversation(&self, title: &str, active: Vec<String>) -> Result<Conversation> {
        let state = self.shared.state.lock();
        if let Some(unknown) = active.iter().find(|id| state.participant(id).is_none()) {
            return Err(SymposiumError::ParticipantNotFound(unknown.clone()));
        }

        let conversation = Conversation::new(title, active);
        self.shared.store.create_conversation(&conversation)?;
        tracing::info!(conversation_id = %conversation.id, title = %conversation.title, "Created conversation");
        Ok(conversation)
    }

    /// Delete a conversation, its messages, and every request for it.
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let cancelled = {
            let mut state = self.shared.state.lock();
            self.shared.store.delete_conversation(conversation_id)?;

            let mut cancelled = state.remove_conversation(conversation_id);
            let running: Vec<String> = state
                .in_flight()
                .filter(|r| r.conversation_id == conversation_id)
                .map(|r| r.id.clone())
                .collect();
            let mut tasks = self.shared.tasks.lock();
            for request_id in running {
                if let Some(handle) = tasks.remove(&request_id) {
                    handle.abort();
                }
                cancelled.extend(state.finish(&request_id));
            }
            cancelled
        };

        for request in &cancelled {
            self.shared.observer.on_finished(request, &RequestOutcome::Cancelled);
        }
        tracing::info!(conversation_id, cancelled = cancelled.len(), "Deleted conversation");
        Ok(())
    }

    pub fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.shared.store.conversation(conversation_id)
    }

    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.shared.store.messages(conversation_id)
    }

    pub fn activate_participant(&self, conversation_id: &str, participant_id: &str) -> Result<()> {
        if self.shared.state.lock().participant(participant_id).is_none() {
            return Err(SymposiumError::ParticipantNotFound(participant_id.to_string()));
        }
        self.edit_conversation(conversation_id, |c| c.activate(participant_id))
    }

    pub fn deactivate_participant(&self, conversation_id: &str, participant_id: &str) -> Result<()> {
        self.edit_conversation(conversation_id, |c| c.deactivate(participant_id))
    }

    fn edit_conversation(&self, conversation_id: &str, edit: impl FnOnce(&mut Conversation)) -> Result<()> {
        let mut conversation = self
            .shared
            .store
            .conversation(conversation_id)?
            .ok_or_else(|| SymposiumError::ConversationNotFound(conversation_id.to_string()))?;
        edit(&mut conversation);
        conversation.touch();
        self.shared.store.update_conversation(&conversation)
    }

    //=== Messages ===

    /// Append a human message and queue a pending turn for it.
    pub fn submit_user_message(&self, conversation_id: &str, content: &str) -> Result<Message> {
        let message = Message::user(conversation_id, content);
        let request = QueuedRequest::pending_turn(conversation_id, &message.id, TriggerSource::User);
        self.append_and_enqueue(message, request)
    }

    /// Append a human message that only `participant_id` should answer.
    pub fn address_participant(&self, conversation_id: &str, content: &str, participant_id: &str) -> Result<Message> {
        let message = Message::user(conversation_id, content);
        let request = QueuedRequest::addressed_to(conversation_id, &message.id, TriggerSource::User, participant_id);
        self.append_and_enqueue(message, request)
    }

    /// Append a system notice and queue a pending turn for it.
    pub fn post_system_message(&self, conversation_id: &str, content: &str) -> Result<Message> {
        let message = Message::system(conversation_id, content);
        let request = QueuedRequest::pending_turn(conversation_id, &message.id, TriggerSource::System);
        self.append_and_enqueue(message, request)
    }

    fn append_and_enqueue(&self, message: Message, request: QueuedRequest) -> Result<Message> {
        {
            let mut state = self.shared.state.lock();
            self.shared.store.append_message(&message)?;
            state.record_message(&message);
            state.enqueue(request);
        }
        tracing::debug!(conversation_id = %message.conversation_id, message_id = %message.id, "Message appended");
        self.shared.notify(SchedulerEvent::MessageAppended {
            conversation_id: message.conversation_id.clone(),
        });
        Ok(message)
    }

    /// Queue an idle-timer turn chained off the latest message.
    /// Only admitted under `quick` pacing.
    pub fn nudge(&self, conversation_id: &str) -> Result<QueuedRequest> {
        let mut state = self.shared.state.lock();
        let conversation = self
            .shared
            .store
            .conversation(conversation_id)?
            .ok_or_else(|| SymposiumError::ConversationNotFound(conversation_id.to_string()))?;
        let last = conversation
            .message_ids
            .last()
            .ok_or_else(|| SymposiumError::InvalidState(format!("conversation {} has no messages", conversation_id)))?;

        let request = QueuedRequest::pending_turn(conversation_id, last, TriggerSource::Timer);
        state.enqueue(request.clone());
        drop(state);

        self.shared.notify(SchedulerEvent::MessageAppended {
            conversation_id: conversation_id.to_string(),
        });
        Ok(request)
    }

    //=== Introspection ===

    pub fn queue(&self) -> Vec<QueuedRequest> {
        self.shared.state.lock().queue().to_vec()
    }

    pub fn in_flight(&self) -> Vec<QueuedRequest> {
        self.shared.state.lock().in_flight().cloned().collect()
    }

    /// Current selection probability of each active participant
    pub fn selection_probabilities(&self, conversation_id: &str) -> Result<Vec<(String, f64)>> {
        let conversation = self
            .shared
            .store
            .conversation(conversation_id)?
            .ok_or_else(|| SymposiumError::ConversationNotFound(conversation_id.to_string()))?;
        let active = conversation.active_participant_ids;
        let probabilities = self.shared.state.lock().probabilities(conversation_id, &active);
        Ok(active.into_iter().zip(probabilities).collect())
    }

    //=== Scheduling ===

    /// Perform one scheduling pass and spawn a runner per admitted request.
    pub fn tick(&self) -> Admission {
        self.reap_completed();

        let store = &self.shared.store;
        let admission = {
            let mut state = self.shared.state.lock();

            let mut rosters = HashMap::new();
            for conversation_id in state.queued_conversations() {
                match store.conversation(&conversation_id) {
                    Ok(Some(conversation)) => {
                        rosters.insert(conversation_id, conversation.active_participant_ids);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Store unavailable, skipping scheduling pass");
                        return Admission::default();
                    }
                }
            }

            let admission = {
                let mut rng = self.shared.rng.lock();
                state.admit(&rosters, rng.as_mut())
            };

            for request in &admission.admitted {
                if let Err(e) = store.set_message_status(&request.trigger_message_id, MessageStatus::Streaming, None) {
                    tracing::warn!(request_id = %request.id, error = %e, "Failed to mark trigger streaming");
                }
            }
            for (request, reason) in &admission.dropped {
                if *reason == DropReason::MissingConversation {
                    let _ = store.set_message_status(
                        &request.trigger_message_id,
                        MessageStatus::Error,
                        Some(reason.to_string()),
                    );
                }
            }
            admission
        };

        for (request, reason) in &admission.dropped {
            self.shared.observer.on_dropped(request, *reason);
        }

        let mut tasks = self.shared.tasks.lock();
        for request in &admission.admitted {
            self.shared.observer.on_admitted(request);
            let runner = RequestRunner::new(self.shared.clone(), request.clone());
            tasks.insert(request.id.clone(), tokio::spawn(runner.run()));
        }

        admission
    }

    /// Cancel a queued or in-flight request.
    ///
    /// An in-flight request's task is aborted, its response message becomes
    /// `cancelled` and its slot is released immediately.
    pub fn cancel(&self, request_id: &str) -> Result<()> {
        let request = {
            let mut state = self.shared.state.lock();
            if let Some(request) = state.remove_queued(request_id) {
                request
            } else if let Some(request) = state.finish(request_id) {
                if let Some(handle) = self.shared.tasks.lock().remove(request_id) {
                    handle.abort();
                }
                let store = &self.shared.store;
                if let Some(response_id) = &request.response_message_id {
                    if let Err(e) = store.set_message_status(response_id, MessageStatus::Cancelled, None) {
                        tracing::warn!(request_id, error = %e, "Failed to mark response cancelled");
                    }
                }
                if let Err(e) = store.set_message_status(&request.trigger_message_id, MessageStatus::Complete, None) {
                    tracing::warn!(request_id, error = %e, "Failed to restore trigger message");
                }
                request
            } else {
                return Err(SymposiumError::RequestNotFound(request_id.to_string()));
            }
        };

        self.shared.observer.on_finished(&request, &RequestOutcome::Cancelled);
        self.shared.notify(SchedulerEvent::RequestFinished {
            request_id: request.id.clone(),
        });
        Ok(())
    }

    /// Event-driven scheduling loop; ticks on every event while
    /// `auto_start` is on. Returns after `shutdown()`.
    pub async fn run(&self) -> Result<()> {
        let mut events = self
            .shared
            .events_rx
            .lock()
            .take()
            .ok_or_else(|| SymposiumError::InvalidState("scheduler loop already running".to_string()))?;

        tracing::info!("Scheduler loop started");
        if self.settings().auto_start {
            self.tick();
        }

        while let Some(event) = events.recv().await {
            if event == SchedulerEvent::Shutdown {
                break;
            }
            tracing::debug!(?event, "Scheduler event");
            if self.settings().auto_start {
                self.tick();
            }
        }

        tracing::info!("Scheduler loop stopped");
        Ok(())
    }

    /// Tick and wait until nothing more can be admitted.
    pub async fn run_until_idle(&self) {
        loop {
            let admission = self.tick();
            let busy = !self.shared.tasks.lock().is_empty();
            if admission.admitted.is_empty() && !busy {
                break;
            }
            self.wait_idle().await;
        }
    }

    /// Wait for running requests and metadata lookups to finish.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.shared.tasks.lock().values().all(|h| h.is_finished())
                && self.shared.background.lock().iter().all(|h| h.is_finished());
            if idle {
                break;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Cancel everything in flight and stop the loop.
    pub fn shutdown(&self) {
        let running: Vec<String> = self.in_flight().into_iter().map(|r| r.id).collect();
        for request_id in running {
            if let Err(e) = self.cancel(&request_id) {
                tracing::debug!(request_id = %request_id, error = %e, "Request finished during shutdown");
            }
        }
        for handle in self.shared.background.lock().drain(..) {
            handle.abort();
        }
        self.shared.notify(SchedulerEvent::Shutdown);
    }

    /// Drop handles of finished runners and lookups.
    fn reap_completed(&self) {
        self.shared.tasks.lock().retain(|_, handle| !handle.is_finished());
        self.shared.background.lock().retain(|handle| !handle.is_finished());
    }
}
