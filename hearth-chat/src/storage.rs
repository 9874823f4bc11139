use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::types::{Conversation, ConversationId, StoreError};

/// Persistent storage for conversations.
///
/// A conversation is stored and loaded as one opaque unit. The orchestrator
/// treats every failure as best-effort: it logs the error and keeps its
/// in-memory state.
///
/// # Examples
///
/// ```rust
/// use hearth_chat::storage::{ConversationStore, FileConversationStore};
/// use std::path::PathBuf;
///
/// let store = FileConversationStore::new(PathBuf::from(".hearth-conversations"));
/// ```
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Atomically write a conversation, replacing any earlier version.
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// `Ok(None)` when no conversation with this id exists.
    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// Every stored conversation, in no particular order.
    async fn load_all(&self) -> Result<Vec<Conversation>, StoreError>;

    /// `Ok(true)` if a conversation was removed.
    async fn delete(&self, id: &ConversationId) -> Result<bool, StoreError>;
}

/// Stores each conversation as `<id>.json` in one directory.
///
/// Writes go to a uniquely named temporary file which is then renamed over
/// the target, so an interrupted save never leaves a truncated conversation
/// behind. Saves and deletes hold `write_lock`; clones share it.
#[derive(Debug, Clone)]
pub struct FileConversationStore {
    storage_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileConversationStore {
    /// The directory is created on first save.
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub async fn ensure_storage_dir(&self) -> Result<(), StoreError> {
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await.map_err(|e| {
                StoreError::io(
                    format!(
                        "Failed to create conversation directory {}",
                        self.storage_dir.display()
                    ),
                    e,
                )
            })?;
            info!(
                "Created conversation storage directory: {}",
                self.storage_dir.display()
            );
        }
        Ok(())
    }

    fn conversation_file_path(&self, id: &ConversationId) -> PathBuf {
        self.storage_dir.join(format!("{}.json", id))
    }

    async fn read_conversation(path: &Path) -> Result<Conversation, StoreError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io("Failed to read conversation file", e))?;
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!(
                "Failed to parse conversation file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.ensure_storage_dir().await?;

        let target = self.conversation_file_path(&conversation.id);
        let json = serde_json::to_string_pretty(conversation).map_err(|e| {
            StoreError::Serialization(format!("Failed to serialize conversation: {}", e))
        })?;

        let _lock = self.write_lock.lock().await;
        let temp_file = self
            .storage_dir
            .join(format!("{}.tmp.{}", conversation.id, ulid::Ulid::new()));
        let mut file = fs::File::create(&temp_file)
            .await
            .map_err(|e| StoreError::io("Failed to create temp conversation file", e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StoreError::io("Failed to write conversation", e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io("Failed to flush conversation", e))?;
        drop(file);

        if let Err(e) = fs::rename(&temp_file, &target).await {
            let _ = fs::remove_file(&temp_file).await;
            return Err(StoreError::io("Failed to rename conversation file", e));
        }

        debug!(
            "Saved conversation {} ({} messages) to disk",
            conversation.id,
            conversation.messages.len()
        );
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        let path = self.conversation_file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let conversation = Self::read_conversation(&path).await?;
        debug!("Loaded conversation {} from disk", id);
        Ok(Some(conversation))
    }

    async fn load_all(&self) -> Result<Vec<Conversation>, StoreError> {
        if !self.storage_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.storage_dir).await.map_err(|e| {
            StoreError::io(
                format!(
                    "Failed to list conversation directory {}",
                    self.storage_dir.display()
                ),
                e,
            )
        })?;

        let mut conversations = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("Failed to read directory entry", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_conversation(&path).await {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => warn!("Skipping unreadable conversation {}: {}", path.display(), e),
            }
        }

        debug!(
            "Loaded {} conversations from {}",
            conversations.len(),
            self.storage_dir.display()
        );
        Ok(conversations)
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let _lock = self.write_lock.lock().await;
        let path = self.conversation_file_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::io("Failed to delete conversation file", e))?;
        debug!("Deleted conversation {} from disk", id);
        Ok(true)
    }
}

/// Keeps conversations in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Conversation>, StoreError> {
        Ok(self.conversations.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, StoreError> {
        Ok(self.conversations.write().await.remove(id).is_some())
    }
}
