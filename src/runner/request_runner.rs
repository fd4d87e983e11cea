//! Request runner implementation.
//!
//! A runner owns one admitted request. It never holds the scheduler lock
//! across an await; every write re-checks that the request is still in
//! flight, so a cancellation that lands between two steps simply makes the
//! runner stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::metadata::fetch_with_retry;
use super::prompt::{build_prompt, history_until};
use crate::domain::{Message, MessageStatus, Participant, QueuedRequest, RequestStatus, TriggerSource};
use crate::error::{Result, SymposiumError};
use crate::provider::{CompletionRequest, CompletionResponse, StreamChunk};
use crate::scheduler::manager::{SchedulerEvent, Shared};
use crate::scheduler::observer::RequestOutcome;

/// Content stored when a participant produced nothing
pub const NO_RESPONSE_PLACEHOLDER: &str = "(no response)";

const STREAM_BUFFER: usize = 64;

/// Everything resolved up front for one turn
struct Turn {
    participant: Participant,
    participants: Vec<Participant>,
    history: Vec<Message>,
    response: Message,
}

/// Executes a single admitted request.
pub(crate) struct RequestRunner {
    shared: Arc<Shared>,
    request: QueuedRequest,
}

impl RequestRunner {
    pub(crate) fn new(shared: Arc<Shared>, request: QueuedRequest) -> Self {
        Self { shared, request }
    }

    /// Run to completion. Failures become message status transitions.
    pub(crate) async fn run(self) {
        let delay = self.shared.state.lock().settings().response_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Err(e) = self.execute().await {
            self.fail(e);
        }
    }

    async fn execute(&self) -> Result<()> {
        let Some(turn) = self.prepare()? else {
            return Ok(());
        };

        let request = self.completion_request(&turn);
        let mut response = turn.response;

        let result = if self.shared.runner.use_streaming {
            self.stream(request, &mut response).await?
        } else {
            self.shared.provider.complete(request).await?
        };

        let Some(message) = self.finalize(response, &result)? else {
            return Ok(());
        };

        if let Some(generation_id) = result.id {
            self.spawn_metadata(message.id, generation_id);
        }
        Ok(())
    }

    /// Resolve references and create the streaming response message.
    /// Returns None if the request was cancelled before it started.
    fn prepare(&self) -> Result<Option<Turn>> {
        let request = &self.request;
        let store = &self.shared.store;
        let mut state = self.shared.state.lock();
        if !state.is_in_flight(&request.id) {
            return Ok(None);
        }

        let participant_id = request
            .participant_id()
            .ok_or_else(|| SymposiumError::InvalidState(format!("request {} has no participant", request.id)))?;
        let participant = state
            .participant(participant_id)
            .cloned()
            .ok_or_else(|| SymposiumError::ParticipantNotFound(participant_id.to_string()))?;

        if store.conversation(&request.conversation_id)?.is_none() {
            return Err(SymposiumError::ConversationNotFound(request.conversation_id.clone()));
        }
        let transcript = store.messages(&request.conversation_id)?;
        let history = history_until(&transcript, &request.trigger_message_id)
            .ok_or_else(|| SymposiumError::MessageNotFound(request.trigger_message_id.clone()))?
            .to_vec();

        let response = Message::streaming_response(&request.conversation_id, participant_id);
        store.append_message(&response)?;
        state.set_response_message(&request.id, &response.id)?;

        tracing::info!(
            request_id = %request.id,
            participant_id = %participant.id,
            message_id = %response.id,
            "Generating response"
        );

        Ok(Some(Turn {
            participant,
            participants: state.participants().to_vec(),
            history,
            response,
        }))
    }

    fn completion_request(&self, turn: &Turn) -> CompletionRequest {
        let messages = build_prompt(&turn.participant, &turn.history, &turn.participants);
        let mut request = CompletionRequest::new(&turn.participant.model, messages)
            .with_temperature(turn.participant.temperature)
            .with_metadata("conversation_id", &self.request.conversation_id)
            .with_metadata("participant_id", &turn.participant.id)
            .with_metadata("request_id", &self.request.id);
        request.max_tokens = self.shared.runner.max_tokens;
        request
    }

    /// Stream the completion, persisting each delta as it arrives.
    async fn stream(&self, request: CompletionRequest, response: &mut Message) -> Result<CompletionResponse> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel(STREAM_BUFFER);
        let provider = self.shared.provider.stream(request, chunk_tx);

        let consumer = async move {
            while let Some(chunk) = chunk_rx.recv().await {
                let StreamChunk::TextDelta(delta) = chunk else {
                    continue;
                };
                if !self.persist_delta(response, &delta)? {
                    break;
                }
            }
            Ok::<(), SymposiumError>(())
        };

        let (result, consumed) = tokio::join!(provider, consumer);
        consumed?;
        Ok(result?)
    }

    /// Append a delta and flush it. Returns false once the request is gone.
    fn persist_delta(&self, response: &mut Message, delta: &str) -> Result<bool> {
        let state = self.shared.state.lock();
        if !state.is_in_flight(&self.request.id) {
            return Ok(false);
        }
        response.content.push_str(delta);
        response.touch();
        self.shared.store.update_message(response)?;
        Ok(true)
    }

    /// Complete the response, advance affinity and chain a follow-up turn.
    fn finalize(&self, mut response: Message, result: &CompletionResponse) -> Result<Option<Message>> {
        let store = &self.shared.store;
        let (request, follow_up) = {
            let mut state = self.shared.state.lock();
            if !state.is_in_flight(&self.request.id) {
                return Ok(None);
            }

            let text = if result.content.is_empty() {
                response.content.trim().to_string()
            } else {
                result.content.trim().to_string()
            };
            response.content = if text.is_empty() {
                NO_RESPONSE_PLACEHOLDER.to_string()
            } else {
                text
            };
            response.set_status(MessageStatus::Complete, None);
            store.update_message(&response)?;
            store.set_message_status(&self.request.trigger_message_id, MessageStatus::Complete, None)?;

            state.record_message(&response);
            let request = state.finish(&self.request.id).unwrap_or_else(|| self.request.clone());

            let follow_up = QueuedRequest::pending_turn(&response.conversation_id, &response.id, TriggerSource::Participant);
            state.enqueue(follow_up.clone());
            (request, follow_up)
        };

        tracing::info!(
            request_id = %request.id,
            message_id = %response.id,
            follow_up = %follow_up.id,
            "Response complete"
        );
        self.shared.observer.on_finished(&request, &RequestOutcome::Complete);
        self.shared.notify(SchedulerEvent::RequestFinished {
            request_id: request.id.clone(),
        });
        Ok(Some(response))
    }

    /// Convert a failure into message status and release the slot.
    fn fail(&self, error: SymposiumError) {
        let detail = error.to_string();
        let store = &self.shared.store;

        let request = {
            let mut state = self.shared.state.lock();
            let Some(mut request) = state.finish(&self.request.id) else {
                // cancelled while running; the canceller did the bookkeeping
                return;
            };

            let missing_reference = matches!(
                error,
                SymposiumError::ConversationNotFound(_)
                    | SymposiumError::ParticipantNotFound(_)
                    | SymposiumError::MessageNotFound(_)
            );

            if missing_reference {
                log_store_error(store.set_message_status(
                    &request.trigger_message_id,
                    MessageStatus::Error,
                    Some(detail.clone()),
                ));
            } else {
                if let Some(response_id) = &request.response_message_id {
                    log_store_error(store.set_message_status(response_id, MessageStatus::Error, Some(detail.clone())));
                }
                log_store_error(store.set_message_status(&request.trigger_message_id, MessageStatus::Complete, None));
            }
            request.status = RequestStatus::Error;
            request.error = Some(detail.clone());
            request
        };

        self.shared.observer.on_finished(&request, &RequestOutcome::Error(detail));
        self.shared.notify(SchedulerEvent::RequestFinished {
            request_id: request.id.clone(),
        });
    }

    fn spawn_metadata(&self, message_id: String, generation_id: String) {
        if self.shared.runner.metadata.max_attempts == 0 {
            return;
        }

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            let Some(metadata) = fetch_with_retry(shared.provider.as_ref(), &generation_id, &shared.runner.metadata).await
            else {
                return;
            };

            let value = match serde_json::to_value(&metadata) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(message_id = %message_id, error = %e, "Unserializable generation metadata");
                    return;
                }
            };

            match shared.store.attach_generation(&message_id, value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(message_id = %message_id, "Message gone before metadata arrived");
                }
                Err(e) => {
                    tracing::warn!(message_id = %message_id, error = %e, "Failed to store generation metadata");
                }
            }
        });
        self.shared.background.lock().push(handle);
    }
}

fn log_store_error<T>(result: Result<T>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to update message status");
    }
}
