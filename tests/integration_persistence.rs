//! Persistence integration tests
//!
//! Runs the scheduler on the JSONL store and checks what survives a restart.

use std::sync::Arc;
use std::time::Duration;

use symposium::domain::{Author, Conversation, Message, MessageStatus, Participant};
use symposium::error::Result;
use symposium::provider::{MockProvider, MockReply};
use symposium::recovery::{INTERRUPTED_DETAIL, recover_interrupted};
use symposium::runner::{MetadataPolicy, RunnerConfig};
use symposium::scheduler::{Argmax, ConversationScheduler, ResponsePacing, SchedulerSettings};
use symposium::storage::{JsonlStore, MessageStore};
use tempfile::TempDir;

fn scheduler(store: Arc<dyn MessageStore>, provider: MockProvider) -> Result<ConversationScheduler> {
    paced_scheduler(store, provider, ResponsePacing::Relaxed)
}

fn paced_scheduler(
    store: Arc<dyn MessageStore>,
    provider: MockProvider,
    pacing: ResponsePacing,
) -> Result<ConversationScheduler> {
    ConversationScheduler::builder(store, Arc::new(provider))
        .settings(
            SchedulerSettings::default()
                .with_pacing(pacing)
                .with_max_concurrent(1)
                .with_response_delay_ms(0),
        )
        .participants(vec![
            Participant::new("alpha", "Alpha").with_eagerness(0.6),
            Participant::new("beta", "Beta").with_eagerness(0.4),
        ])
        .random_source(Box::new(Argmax))
        .runner_config(RunnerConfig::default().with_metadata(MetadataPolicy::disabled()))
        .build()
}

/// Integration test: a finished exchange is readable after reopening
#[tokio::test]
async fn test_transcript_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let conversation_id = {
        let store: Arc<dyn MessageStore> = Arc::new(JsonlStore::open(temp_dir.path())?);
        let scheduler = scheduler(store, MockProvider::with_texts(["Morning!"]))?;
        let conv = scheduler.create_conversation("Standup", vec!["alpha".into(), "beta".into()])?;
        scheduler.submit_user_message(&conv.id, "Good morning")?;
        scheduler.run_until_idle().await;
        conv.id
    };

    let reopened = JsonlStore::open(temp_dir.path())?;
    let conversation = reopened.conversation(&conversation_id)?.expect("conversation persisted");
    assert_eq!(conversation.title, "Standup");
    assert_eq!(conversation.message_ids.len(), 2);

    let messages = reopened.messages(&conversation_id)?;
    assert_eq!(messages[0].author, Author::User);
    assert_eq!(messages[0].status, MessageStatus::Complete);
    assert_eq!(messages[1].author, Author::Participant("alpha".to_string()));
    assert_eq!(messages[1].content, "Morning!");
    assert_eq!(messages[1].status, MessageStatus::Complete);

    Ok(())
}

/// Integration test: a response cut off mid-flight is repaired on restart
#[tokio::test]
async fn test_interrupted_response_recovered() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store: Arc<dyn MessageStore> = Arc::new(JsonlStore::open(temp_dir.path())?);
    let running = scheduler(store, MockProvider::new(vec![MockReply::Hang]))?;
    let conv = running.create_conversation("Crash", vec!["alpha".into()])?;
    running.submit_user_message(&conv.id, "Are you there?")?;

    assert_eq!(running.tick().admitted.len(), 1);
    for _ in 0..200 {
        if running.messages(&conv.id)?.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // the first process is never shut down; a second one opens the same journals
    let restarted = JsonlStore::open(temp_dir.path())?;
    let before = restarted.messages(&conv.id)?;
    assert_eq!(before[0].status, MessageStatus::Streaming);
    assert_eq!(before[1].status, MessageStatus::Streaming);

    let stats = recover_interrupted(&restarted)?;
    assert_eq!(stats.interrupted_responses, 1);
    assert_eq!(stats.restored_triggers, 1);

    let after = JsonlStore::open(temp_dir.path())?.messages(&conv.id)?;
    assert_eq!(after[0].status, MessageStatus::Complete);
    assert_eq!(after[1].status, MessageStatus::Error);
    assert_eq!(after[1].status_detail.as_deref(), Some(INTERRUPTED_DETAIL));

    Ok(())
}

/// Integration test: a finished reply that triggered the crashed turn stays finished
#[tokio::test]
async fn test_completed_reply_survives_crash_during_chained_turn() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store: Arc<dyn MessageStore> = Arc::new(JsonlStore::open(temp_dir.path())?);
    let provider = MockProvider::new(vec![MockReply::Text("one".to_string()), MockReply::Hang]);
    let running = paced_scheduler(store, provider, ResponsePacing::Steady)?;
    let conv = running.create_conversation("Chain", vec!["alpha".into()])?;
    running.submit_user_message(&conv.id, "Count for me")?;

    assert_eq!(running.tick().admitted.len(), 1);
    running.wait_idle().await;

    // the reply "one" now triggers the next turn, which never finishes
    let chained = running.tick().admitted;
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].trigger_message_id, running.messages(&conv.id)?[1].id);
    for _ in 0..200 {
        if running.messages(&conv.id)?.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let restarted = JsonlStore::open(temp_dir.path())?;
    let before = restarted.messages(&conv.id)?;
    assert_eq!(before.len(), 3);
    assert_eq!(before[1].status, MessageStatus::Streaming);
    assert_eq!(before[2].status, MessageStatus::Streaming);

    let stats = recover_interrupted(&restarted)?;
    assert_eq!(stats.interrupted_responses, 1);
    assert_eq!(stats.restored_triggers, 1);

    let after = JsonlStore::open(temp_dir.path())?.messages(&conv.id)?;
    assert_eq!(after[0].status, MessageStatus::Complete);
    assert_eq!(after[1].content, "one");
    assert_eq!(after[1].status, MessageStatus::Complete);
    assert_eq!(after[1].status_detail, None);
    assert_eq!(after[2].status, MessageStatus::Error);
    assert_eq!(after[2].status_detail.as_deref(), Some(INTERRUPTED_DETAIL));

    Ok(())
}

/// Integration test: generation metadata written after the fact is journaled
#[tokio::test]
async fn test_generation_metadata_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonlStore::open(temp_dir.path())?;
    let conv = Conversation::new("Meta", vec!["alpha".into()]);
    store.create_conversation(&conv)?;
    let reply = Message::streaming_response(&conv.id, "alpha");
    store.append_message(&reply)?;

    assert!(store.attach_generation(&reply.id, serde_json::json!({ "id": "gen-1" }))?);
    assert!(!store.attach_generation("missing", serde_json::json!({}))?);

    let loaded = JsonlStore::open(temp_dir.path())?.message(&reply.id)?.expect("message persisted");
    assert_eq!(loaded.generation, Some(serde_json::json!({ "id": "gen-1" })));
    assert_eq!(loaded.status, MessageStatus::Streaming);

    Ok(())
}

/// Integration test: a conversation continues after recovery
#[tokio::test]
async fn test_conversation_continues_after_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let conversation_id = {
        let store: Arc<dyn MessageStore> = Arc::new(JsonlStore::open(temp_dir.path())?);
        let scheduler = scheduler(store, MockProvider::with_texts(["first"]))?;
        let conv = scheduler.create_conversation("Resume", vec!["alpha".into(), "beta".into()])?;
        scheduler.submit_user_message(&conv.id, "hello")?;
        scheduler.run_until_idle().await;
        conv.id
    };

    let store = JsonlStore::open(temp_dir.path())?;
    assert_eq!(recover_interrupted(&store)?.total(), 0);
    store.compact()?;

    let scheduler = scheduler(Arc::new(store), MockProvider::with_texts(["second"]))?;
    scheduler.address_participant(&conversation_id, "Beta, your turn", "beta")?;
    scheduler.run_until_idle().await;

    let messages = scheduler.messages(&conversation_id)?;
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "first", "Beta, your turn", "second"]);
    assert_eq!(messages[3].author, Author::Participant("beta".to_string()));

    Ok(())
}
