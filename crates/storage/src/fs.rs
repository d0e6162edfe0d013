//! Filesystem storage backend — keys map to paths under a root directory.
//!
//! Each key becomes a relative path (`vault/A.json` →
//! `{root}/vault/A.json`); parent directories are created on write. Keys
//! that would escape the root are rejected.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tamalebot_core::StorageError;
use tracing::debug;

use crate::StorageBackend;

/// Durable key→bytes store rooted at a directory.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`. The directory is created if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::Io(format!("Failed to create storage root: {e}")))?;
        debug!(root = %root.display(), "Filesystem storage backend ready");
        Ok(Self { root })
    }

    /// Resolve a key to an absolute path, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        let rel = Path::new(key);
        let escapes = rel.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            return Err(StorageError::InvalidKey(format!(
                "Key '{key}' escapes the storage root"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    fn name(&self) -> &str {
        "fs"
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(format!("Failed to create parent dirs: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write {key}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!("Failed to read {key}: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("Failed to delete {key}: {e}"))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Walk only the directory portion of the prefix; filter the rest.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let dir = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.path_for(dir_part)?
        };

        let mut keys = Vec::new();
        let mut pending = vec![dir];
        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(format!("Failed to list: {e}"))),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_creates_parents_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackend::new(dir.path()).unwrap();

        store.put("vault/KEY.json", b"cipher").await.unwrap();
        assert_eq!(
            store.get("vault/KEY.json").await.unwrap(),
            Some(b"cipher".to_vec())
        );
        assert!(dir.path().join("vault/KEY.json").exists());
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackend::new(dir.path()).unwrap();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackend::new(dir.path()).unwrap();
        let err = store.put("../outside", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        let err = store.get("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn list_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackend::new(dir.path()).unwrap();
        store.put("schedules/aa.json", b"1").await.unwrap();
        store.put("schedules/bb.json", b"2").await.unwrap();
        store.put("vault/CC.json", b"3").await.unwrap();

        let keys = store.list("schedules/").await.unwrap();
        assert_eq!(keys, vec!["schedules/aa.json", "schedules/bb.json"]);
    }

    #[tokio::test]
    async fn delete_then_get_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackend::new(dir.path()).unwrap();
        store.put("k.json", b"v").await.unwrap();
        store.delete("k.json").await.unwrap();
        assert_eq!(store.get("k.json").await.unwrap(), None);
    }
}
