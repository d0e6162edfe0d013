//! Conversation stores — the pluggable owners of canonical history.
//!
//! The in-memory map is always authoritative for the session. The
//! persistent variant additionally snapshots each chat through a storage
//! backend; a persistence failure is logged and swallowed, never failing
//! the turn.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tamalebot_core::ChatMessage;
use tamalebot_storage::StorageBackend;
use tokio::sync::RwLock;
use tracing::warn;

const CONVERSATION_PREFIX: &str = "conversations/";

/// Aggregate numbers for the memory-stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationStats {
    pub conversation_count: usize,
    pub total_messages: usize,
}

/// Owner of per-chat canonical histories.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The history for a chat; empty when the chat is new.
    async fn load(&self, chat_id: &str) -> Vec<ChatMessage>;

    /// Replace the stored history for a chat.
    async fn save(&self, chat_id: &str, history: &[ChatMessage]);

    /// Forget a chat.
    async fn clear(&self, chat_id: &str);

    async fn stats(&self) -> ConversationStats;
}

/// Volatile store; state dies with the process.
#[derive(Default)]
pub struct InMemoryConversations {
    chats: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryConversations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversations {
    async fn load(&self, chat_id: &str) -> Vec<ChatMessage> {
        self.chats
            .read()
            .await
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(&self, chat_id: &str, history: &[ChatMessage]) {
        self.chats
            .write()
            .await
            .insert(chat_id.to_string(), history.to_vec());
    }

    async fn clear(&self, chat_id: &str) {
        self.chats.write().await.remove(chat_id);
    }

    async fn stats(&self) -> ConversationStats {
        let chats = self.chats.read().await;
        ConversationStats {
            conversation_count: chats.len(),
            total_messages: chats.values().map(Vec::len).sum(),
        }
    }
}

/// In-memory authority plus best-effort snapshots at
/// `conversations/{chat_id}.json`.
pub struct PersistentConversations {
    memory: InMemoryConversations,
    storage: Arc<dyn StorageBackend>,
}

impl PersistentConversations {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            memory: InMemoryConversations::new(),
            storage,
        }
    }

    fn key(chat_id: &str) -> String {
        format!("{CONVERSATION_PREFIX}{chat_id}.json")
    }
}

#[async_trait]
impl ConversationStore for PersistentConversations {
    async fn load(&self, chat_id: &str) -> Vec<ChatMessage> {
        let cached = self.memory.load(chat_id).await;
        if !cached.is_empty() {
            return cached;
        }

        // Cold start: fall back to the snapshot.
        match self.storage.get(&Self::key(chat_id)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<ChatMessage>>(&bytes) {
                Ok(history) => {
                    self.memory.save(chat_id, &history).await;
                    history
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "Corrupt conversation snapshot, starting fresh");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to load conversation snapshot");
                Vec::new()
            }
        }
    }

    async fn save(&self, chat_id: &str, history: &[ChatMessage]) {
        self.memory.save(chat_id, history).await;

        // In-memory state stays authoritative; storage trouble is not fatal.
        match serde_json::to_vec(history) {
            Ok(bytes) => {
                if let Err(e) = self.storage.put(&Self::key(chat_id), &bytes).await {
                    warn!(chat_id, error = %e, "Failed to persist conversation");
                }
            }
            Err(e) => warn!(chat_id, error = %e, "Failed to serialize conversation"),
        }
    }

    async fn clear(&self, chat_id: &str) {
        self.memory.clear(chat_id).await;
        if let Err(e) = self.storage.delete(&Self::key(chat_id)).await {
            warn!(chat_id, error = %e, "Failed to delete conversation snapshot");
        }
    }

    async fn stats(&self) -> ConversationStats {
        self.memory.stats().await
    }
}
