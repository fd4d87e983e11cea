//! Line-oriented chat session.
//!
//! Each stdin line is a user message. Lines starting with `/` are commands:
//! `/quit`, `/nudge`, `/odds`, and `/ask <participant> <text>`.

use std::sync::Arc;

use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use symposium::config::Config;
use symposium::domain::{Conversation, Participant, QueuedRequest};
use symposium::provider::OpenRouterClient;
use symposium::recovery::recover_interrupted;
use symposium::scheduler::{ConversationScheduler, DropReason, LogObserver, RequestOutcome, SchedulerObserver};
use symposium::storage::{JsonlStore, MessageStore};

/// Prints finished responses as they complete
struct ConsoleObserver {
    store: Arc<dyn MessageStore>,
    participants: Vec<Participant>,
}

impl ConsoleObserver {
    fn display_name(&self, participant_id: &str) -> String {
        self.participants
            .iter()
            .find(|p| p.id == participant_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| participant_id.to_string())
    }
}

impl SchedulerObserver for ConsoleObserver {
    fn on_admitted(&self, request: &QueuedRequest) {
        LogObserver.on_admitted(request);
    }

    fn on_dropped(&self, request: &QueuedRequest, reason: DropReason) {
        LogObserver.on_dropped(request, reason);
    }

    fn on_finished(&self, request: &QueuedRequest, outcome: &RequestOutcome) {
        LogObserver.on_finished(request, outcome);

        let name = self.display_name(request.participant_id().unwrap_or("?"));
        match outcome {
            RequestOutcome::Complete => {
                let content = request
                    .response_message_id
                    .as_deref()
                    .and_then(|id| self.store.message(id).ok().flatten())
                    .map(|m| m.content)
                    .unwrap_or_default();
                println!("{} {}", format!("{}:", name).green().bold(), content);
            }
            RequestOutcome::Error(detail) => {
                println!("{} {}", format!("{} failed:", name).red(), detail);
            }
            RequestOutcome::Cancelled => {}
        }
    }
}

fn open_conversation(
    scheduler: &ConversationScheduler,
    config: &Config,
    conversation: Option<&str>,
    title: Option<&str>,
) -> Result<Conversation> {
    if let Some(id) = conversation {
        return scheduler
            .conversation(id)?
            .ok_or_else(|| eyre!("Conversation not found: {}", id));
    }

    let active = config.participants.iter().map(|p| p.id.clone()).collect();
    Ok(scheduler.create_conversation(title.unwrap_or("New Conversation"), active)?)
}

pub async fn run_chat(config: &Config, conversation: Option<&str>, title: Option<&str>) -> Result<()> {
    let store = JsonlStore::open(&config.storage.data_dir).context("Failed to open conversation store")?;
    if config.storage.compact_on_start {
        store.compact().context("Failed to compact conversation store")?;
    }
    let recovered = recover_interrupted(&store).context("Failed to recover interrupted responses")?;
    if recovered.total() > 0 {
        println!("{} {} interrupted messages repaired", "Recovery:".yellow(), recovered.total());
    }
    let store: Arc<dyn MessageStore> = Arc::new(store);

    let provider = OpenRouterClient::new(config.provider.clone()).context("Failed to create provider client")?;

    let mut settings = config.scheduler.clone();
    settings.auto_start = true;

    let observer = ConsoleObserver {
        store: store.clone(),
        participants: config.participants.clone(),
    };
    let scheduler = ConversationScheduler::builder(store, Arc::new(provider))
        .settings(settings)
        .participants(config.participants.clone())
        .observer(Arc::new(observer))
        .runner_config(config.runner_config())
        .build()?;

    let conversation = open_conversation(&scheduler, config, conversation, title)?;
    info!("Chatting in conversation {}", conversation.id);
    println!("{} {} ({})", "Conversation:".cyan(), conversation.title, conversation.id);
    println!("{}", "Type a message, or /quit to leave.".dimmed());

    let looping = scheduler.clone();
    let loop_handle = tokio::spawn(async move { looping.run().await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/nudge", _) => scheduler.nudge(&conversation.id).map(|_| ()),
            ("/odds", _) => scheduler.selection_probabilities(&conversation.id).map(|odds| {
                for (participant_id, probability) in odds {
                    println!("  {:<16} {:>6.1}%", participant_id, probability * 100.0);
                }
            }),
            ("/ask", rest) => match rest.split_once(' ') {
                Some((participant_id, text)) => scheduler
                    .address_participant(&conversation.id, text, participant_id)
                    .map(|_| ()),
                None => {
                    println!("{}", "usage: /ask <participant> <text>".yellow());
                    Ok(())
                }
            },
            _ => scheduler.submit_user_message(&conversation.id, line).map(|_| ()),
        };

        if let Err(e) = result {
            println!("{} {}", "Error:".red(), e);
        }
    }

    scheduler.shutdown();
    loop_handle.await.context("Scheduler loop panicked")??;
    Ok(())
}
