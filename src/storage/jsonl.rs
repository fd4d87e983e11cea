//! JSONL journal storage with in-memory caching.
//!
//! Each collection is an append-only journal (`conversations.jsonl`,
//! `messages.jsonl`). Every write appends the full record; on load the last
//! entry per id wins and delete entries remove it. `compact()` rewrites the
//! journals down to one line per live record.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::memory::StoreData;
use super::traits::MessageStore;
use crate::domain::{Conversation, Message, MessageStatus};
use crate::error::Result;

const CONVERSATIONS: &str = "conversations";
const MESSAGES: &str = "messages";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalEntry<T> {
    Put { record: T },
    Delete { id: String },
}

/// JSONL-backed store; reads are served from memory.
#[derive(Debug)]
pub struct JsonlStore {
    base_path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonlStore {
    /// Open (or create) a store in the given directory and replay its journals.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let mut data = StoreData::default();
        for entry in read_journal::<Conversation>(&collection_path(&base_path, CONVERSATIONS))? {
            match entry {
                JournalEntry::Put { record } => {
                    data.conversations.insert(record.id.clone(), record);
                }
                JournalEntry::Delete { id } => {
                    data.conversations.remove(&id);
                }
            }
        }
        for entry in read_journal::<Message>(&collection_path(&base_path, MESSAGES))? {
            match entry {
                JournalEntry::Put { record } => {
                    data.messages.insert(record.id.clone(), record);
                }
                JournalEntry::Delete { id } => {
                    data.messages.remove(&id);
                }
            }
        }

        log::info!(
            "Opened store at {} ({} conversations, {} messages)",
            base_path.display(),
            data.conversations.len(),
            data.messages.len()
        );

        Ok(Self {
            base_path,
            data: Mutex::new(data),
        })
    }

    /// Rewrite both journals with one entry per live record.
    pub fn compact(&self) -> Result<()> {
        let data = self.data.lock();

        let conversations: Vec<JournalEntry<Conversation>> = data
            .conversations_sorted()
            .into_iter()
            .map(|record| JournalEntry::Put { record })
            .collect();
        self.rewrite_file(CONVERSATIONS, &conversations)?;

        let mut messages: Vec<&Message> = data.messages.values().collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let messages: Vec<JournalEntry<&Message>> = messages.into_iter().map(|record| JournalEntry::Put { record }).collect();
        self.rewrite_file(MESSAGES, &messages)?;

        Ok(())
    }

    /// Append one entry to a collection's journal.
    fn append_to_file<T: Serialize>(&self, collection: &str, entry: &JournalEntry<T>) -> Result<()> {
        let path = collection_path(&self.base_path, collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Replace a journal file via a temporary file and rename.
    fn rewrite_file<T: Serialize>(&self, collection: &str, entries: &[JournalEntry<T>]) -> Result<()> {
        let path = collection_path(&self.base_path, collection);
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for entry in entries {
                writeln!(file, "{}", serde_json::to_string(entry)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn collection_path(base: &Path, collection: &str) -> PathBuf {
    base.join(format!("{}.jsonl", collection))
}

/// Read a journal; unparsable lines (e.g. a torn final write) are skipped.
fn read_journal<T: DeserializeOwned>(path: &Path) -> Result<Vec<JournalEntry<T>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping bad journal line {} in {}: {}", number + 1, path.display(), e),
        }
    }
    Ok(entries)
}

impl MessageStore for JsonlStore {
    fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut data = self.data.lock();
        data.create_conversation(conversation)?;
        self.append_to_file(CONVERSATIONS, &JournalEntry::Put { record: conversation })
    }

    fn conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.data.lock().conversations.get(id).cloned())
    }

    fn conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.data.lock().conversations_sorted())
    }

    fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut data = self.data.lock();
        data.update_conversation(conversation)?;
        self.append_to_file(CONVERSATIONS, &JournalEntry::Put { record: conversation })
    }

    fn delete_conversation(&self, id: &str) -> Result<()> {
        let mut data = self.data.lock();
        let removed = data.delete_conversation(id)?;
        for message_id in removed {
            self.append_to_file::<Message>(MESSAGES, &JournalEntry::Delete { id: message_id })?;
        }
        self.append_to_file::<Conversation>(CONVERSATIONS, &JournalEntry::Delete { id: id.to_string() })
    }

    fn append_message(&self, message: &Message) -> Result<()> {
        let mut data = self.data.lock();
        let conversation = data.append_message(message)?;
        self.append_to_file(MESSAGES, &JournalEntry::Put { record: message })?;
        self.append_to_file(CONVERSATIONS, &JournalEntry::Put { record: &conversation })
    }

    fn message(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.data.lock().messages.get(id).cloned())
    }

    fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.data.lock().transcript(conversation_id)
    }

    fn update_message(&self, message: &Message) -> Result<()> {
        let mut data = self.data.lock();
        data.update_message(message)?;
        self.append_to_file(MESSAGES, &JournalEntry::Put { record: message })
    }

    fn set_message_status(&self, id: &str, status: MessageStatus, detail: Option<String>) -> Result<Option<Message>> {
        let mut data = self.data.lock();
        let Some(message) = data.edit_message(id, |m| m.set_status(status, detail)) else {
            return Ok(None);
        };
        self.append_to_file(MESSAGES, &JournalEntry::Put { record: &message })?;
        Ok(Some(message))
    }

    fn attach_generation(&self, id: &str, generation: serde_json::Value) -> Result<bool> {
        let mut data = self.data.lock();
        let edited = data.edit_message(id, |m| {
            m.generation = Some(generation);
            m.touch();
        });
        match edited {
            Some(message) => {
                self.append_to_file(MESSAGES, &JournalEntry::Put { record: &message })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> JsonlStore {
        JsonlStore::open(dir.path()).unwrap()
    }

    #[test]
    fn test_round_trip_through_reopen() {
        let dir = TempDir::new().unwrap();
        let conversation = Conversation::new("persisted", vec!["alpha".into()]);
        let mut reply = Message::streaming_response(&conversation.id, "alpha");
        {
            let store = open(&dir);
            store.create_conversation(&conversation).unwrap();
            store.append_message(&Message::user(&conversation.id, "hi")).unwrap();
            store.append_message(&reply).unwrap();
            reply.content = "partial output".to_string();
            store.update_message(&reply).unwrap();
        }

        let store = open(&dir);
        let transcript = store.messages(&conversation.id).unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, "partial output");
        assert_eq!(transcript[1].status, MessageStatus::Streaming);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let conversation = Conversation::new("c", vec![]);
        let mut msg = Message::streaming_response(&conversation.id, "alpha");
        {
            let store = open(&dir);
            store.create_conversation(&conversation).unwrap();
            store.append_message(&msg).unwrap();
            for word in ["a", "ab", "abc"] {
                msg.content = word.to_string();
                store.update_message(&msg).unwrap();
            }
            msg.set_status(MessageStatus::Complete, None);
            store.update_message(&msg).unwrap();
        }

        let store = open(&dir);
        let loaded = store.message(&msg.id).unwrap().unwrap();
        assert_eq!(loaded.content, "abc");
        assert_eq!(loaded.status, MessageStatus::Complete);
    }

    #[test]
    fn test_delete_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let conversation = Conversation::new("doomed", vec![]);
        let msg = Message::user(&conversation.id, "bye");
        {
            let store = open(&dir);
            store.create_conversation(&conversation).unwrap();
            store.append_message(&msg).unwrap();
            store.delete_conversation(&conversation.id).unwrap();
        }

        let store = open(&dir);
        assert!(store.conversation(&conversation.id).unwrap().is_none());
        assert!(store.message(&msg.id).unwrap().is_none());
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let conversation = Conversation::new("c", vec![]);
        {
            let store = open(&dir);
            store.create_conversation(&conversation).unwrap();
        }
        let path = dir.path().join("conversations.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"op\":\"put\",\"record\":{{\"id\":").unwrap();

        let store = open(&dir);
        assert!(store.conversation(&conversation.id).unwrap().is_some());
    }

    #[test]
    fn test_compact_shrinks_journal() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let conversation = Conversation::new("c", vec![]);
        store.create_conversation(&conversation).unwrap();
        let mut msg = Message::streaming_response(&conversation.id, "alpha");
        store.append_message(&msg).unwrap();
        for i in 0..10 {
            msg.content = format!("chunk {}", i);
            store.update_message(&msg).unwrap();
        }

        let messages_path = dir.path().join("messages.jsonl");
        let before = fs::read_to_string(&messages_path).unwrap().lines().count();
        store.compact().unwrap();
        let after = fs::read_to_string(&messages_path).unwrap().lines().count();
        assert_eq!(before, 11);
        assert_eq!(after, 1);

        let reopened = open(&dir);
        assert_eq!(reopened.message(&msg.id).unwrap().unwrap().content, "chunk 9");
        assert_eq!(reopened.conversations().unwrap().len(), 1);
    }
}
