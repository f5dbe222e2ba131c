//! History persistence for the rfchat CLI
//!
//! Conversations and messages are appended as JSON lines to two files in the
//! data directory. Nothing is ever rewritten; reading back simply parses
//! every line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rfchat_core::{ChatError, ChatMessage, ChatResult, Conversation, PersistenceGateway};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{CliError, Result};

pub const CONVERSATIONS_FILE: &str = "conversations.jsonl";
pub const MESSAGES_FILE: &str = "messages.jsonl";

/// Append-only JSON lines store
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Open the store, creating `dir` if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            CliError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every stored conversation, oldest first
    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        read_lines(&self.dir.join(CONVERSATIONS_FILE))
    }

    /// Every stored message, oldest first
    pub fn messages(&self) -> Result<Vec<ChatMessage>> {
        read_lines(&self.dir.join(MESSAGES_FILE))
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> ChatResult<()> {
        let mut line = serde_json::to_string(record).map_err(ChatError::persistence)?;
        line.push('\n');

        let path = self.dir.join(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        handle.write_all(line.as_bytes()).await?;
        handle.flush().await?;
        debug!("Appended record to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for JsonlStore {
    async fn insert_conversation(&self, conversation: Conversation) -> ChatResult<()> {
        self.append(CONVERSATIONS_FILE, &conversation).await
    }

    async fn insert_message(&self, message: ChatMessage) -> ChatResult<()> {
        self.append(MESSAGES_FILE, &message).await
    }
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(CliError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfchat_core::RemoteDevice;

    fn temp_store() -> JsonlStore {
        let dir = std::env::temp_dir().join(format!("rfchat-store-{}", uuid::Uuid::new_v4()));
        JsonlStore::open(dir).unwrap()
    }

    #[tokio::test]
    async fn test_appends_and_reads_back() {
        let store = temp_store();
        let peer = RemoteDevice::new("10.0.0.2:7373", "Bob");

        store
            .insert_conversation(Conversation::from(&peer))
            .await
            .unwrap();
        store
            .insert_message(ChatMessage::outgoing(&peer, "hi"))
            .await
            .unwrap();
        store
            .insert_message(ChatMessage::incoming(&peer, "hello"))
            .await
            .unwrap();

        let conversations = store.conversations().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].display_name, "Bob");

        let texts: Vec<_> = store.messages().unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["hi", "hello"]);

        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_missing_files_read_as_empty() {
        let store = temp_store();
        assert!(store.messages().unwrap().is_empty());
        assert!(store.conversations().unwrap().is_empty());
        std::fs::remove_dir_all(store.dir()).unwrap();
    }
}
