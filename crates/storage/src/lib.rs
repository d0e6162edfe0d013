//! Storage backend implementations for Tamalebot.
//!
//! A narrow, uniform key→bytes interface. The vault, schedule store, and
//! conversation persistence all sit on top of it, so swapping a laptop
//! filesystem for a remote object store is a construction-time decision.

pub mod fs;
pub mod in_memory;
pub mod remote;

pub use fs::FsBackend;
pub use in_memory::MemoryBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use tamalebot_core::StorageError;

/// A uniform key→bytes store.
///
/// Keys are slash-separated paths like `vault/MY_KEY.json`. Implementations
/// must treat keys as opaque apart from prefix listing.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// A short name for logs ("memory", "fs", "remote").
    fn name(&self) -> &str;

    /// Store bytes under a key, overwriting any existing value.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fetch the bytes under a key, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys starting with the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
