//! Process-local `Storage` backed by a concurrent map, for single-instance
//! deployments and tests. Plays the same role `turbomcp-server`'s
//! `TaskStorage` plays for tasks: a concurrent map plus a periodic sweep,
//! generalized here behind the `Storage` trait and built on `dashmap`
//! instead of `Arc<RwLock<HashMap>>` so reads and writes to different
//! sessions never contend on one lock.

use crate::storage::{Storage, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use vmcp_types::SessionMetadata;

/// In-memory session metadata store.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    records: Arc<DashMap<String, SessionMetadata>>,
}

impl InMemoryStorage {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a background task that sweeps expired records on a fixed
    /// interval, mirroring `TaskStorage::start_cleanup`. Returns the join
    /// handle so callers can abort it on shutdown.
    pub fn start_cleanup(&self, interval: Duration, ttl_seconds: i64) -> tokio::task::JoinHandle<()> {
        let storage = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = storage.delete_expired(ttl_seconds).await {
                    tracing::warn!(error = %err, "session metadata sweep failed");
                }
            }
        })
    }

    /// Current number of stored records (for tests/diagnostics).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store currently holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn store(&self, metadata: SessionMetadata) -> Result<(), StorageError> {
        self.records.insert(metadata.session_id.clone(), metadata);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionMetadata>, StorageError> {
        let Some(mut entry) = self.records.get_mut(session_id) else {
            return Ok(None);
        };
        entry.touch(Utc::now());
        Ok(Some(entry.clone()))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StorageError> {
        self.records.remove(session_id);
        Ok(())
    }

    async fn delete_expired(&self, ttl_seconds: i64) -> Result<Vec<String>, StorageError> {
        let now = Utc::now();
        let mut expired = Vec::new();
        self.records.retain(|session_id, metadata| {
            let age = now.signed_duration_since(metadata.touched_at);
            let alive = age.num_seconds() < ttl_seconds;
            if !alive {
                expired.push(session_id.clone());
            }
            alive
        });
        Ok(expired)
    }
}
