//! Per-conversation turn serialization.
//!
//! Canonical history cannot tolerate interleaved mutation, so turns for one
//! chat must run in submission order, one at a time. Each chat id maps to
//! its own async mutex; the caller holds the guard for the whole turn.
//! Different chats proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one lock per chat id.
#[derive(Default)]
pub struct TurnSerializer {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the chat's turn lock, waiting behind earlier submissions.
    pub async fn acquire(&self, chat_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.entry(chat_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
