//! State document stored as an object in blob storage

use super::{State, StateBackend};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Minimal object store needed by the remote backend
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Object bytes, or `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Bucket or container URL, for logs
    fn describe(&self) -> String;
}

/// State document kept under one key of a [`BlobStore`]
pub struct RemoteBackend {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl StateBackend for RemoteBackend {
    async fn get_state(&self) -> Result<State> {
        let Some(body) = self.store.get(&self.key).await? else {
            tracing::debug!(location = %self.location(), "State object not found, returning empty state");
            return Ok(State::new());
        };
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(State::new());
        }

        serde_json::from_slice(&body).map_err(|e| {
            CloudError::StateError(format!("{} is not a valid state document: {}", self.location(), e))
        })
    }

    async fn write_state(&self, state: &State) -> Result<()> {
        let body = serde_json::to_vec_pretty(state)?;
        self.store.put(&self.key, body).await?;
        tracing::debug!(location = %self.location(), "Saved state");
        Ok(())
    }

    fn location(&self) -> String {
        format!("{}/{}", self.store.describe(), self.key)
    }
}

/// In-process blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects.lock().await.insert(key.to_string(), body);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, Resources};
    use crate::state::ProvidersState;

    #[tokio::test]
    async fn test_missing_object_is_empty_state() {
        let backend = RemoteBackend::new(Arc::new(MemoryBlobStore::new()), "reka/state.json");
        assert_eq!(backend.get_state().await.unwrap(), State::new());
        assert_eq!(backend.location(), "memory:///reka/state.json");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = Arc::new(MemoryBlobStore::new());
        let backend = RemoteBackend::new(store.clone(), "state.json");

        let mut state = State::new();
        state.reconcile(ProvidersState::from([(
            "aws".to_string(),
            Resources::from([("s3".to_string(), vec![Resource::new("logs", "aws", "s3")])]),
        )]));
        backend.write_state(&state).await.unwrap();

        assert!(store.contains("state.json").await);
        assert_eq!(backend.get_state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_invalid_document() {
        let store = Arc::new(MemoryBlobStore::new());
        store.put("state.json", b"[1, 2".to_vec()).await.unwrap();

        let backend = RemoteBackend::new(store, "state.json");
        assert!(matches!(backend.get_state().await, Err(CloudError::StateError(_))));
    }
}
