//! Remote object-store backend — a thin HTTP client.
//!
//! Speaks a minimal REST protocol to an external blob service:
//! `PUT/GET/DELETE {base}/{key}` and `GET {base}/?prefix=` returning a JSON
//! array of keys. The service itself is outside this repository.

use async_trait::async_trait;
use tamalebot_core::StorageError;
use tracing::debug;

use crate::StorageBackend;

/// HTTP-backed key→bytes store.
pub struct RemoteBackend {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        debug!(key, size = bytes.len(), "Remote put");
        let resp = self
            .client
            .put(self.url_for(key))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!(
                "PUT {key} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let resp = self
            .client
            .get(self.url_for(key))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!(
                "GET {key} returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let resp = self
            .client
            .delete(self.url_for(key))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            return Err(StorageError::Backend(format!(
                "DELETE {key} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!(
                "LIST returned {}",
                resp.status()
            )));
        }
        resp.json::<Vec<String>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
