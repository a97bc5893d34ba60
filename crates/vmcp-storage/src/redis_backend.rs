//! Distributed `Storage` backed by Redis, for multi-instance deployments
//! where session metadata must be visible to whichever gateway instance a
//! request lands on. Mirrors the local/distributed provider split
//! `mcb-providers::cache` uses for embedding caches — same trait, a
//! `connection-manager`-backed client standing in for the single-instance
//! map.

use crate::storage::{Storage, StorageError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use vmcp_types::SessionMetadata;

const KEY_PREFIX: &str = "vmcp:session:";

/// Session metadata store backed by a shared Redis instance.
///
/// Each record is stored as a JSON blob under `vmcp:session:{session_id}`
/// with a native Redis expiry set to `default_ttl_seconds`, so Redis itself
/// reclaims stale keys between sweeps; every `load` re-sets that expiry,
/// matching the sliding-TTL behavior `InMemoryStorage` gets from its
/// `touched_at` field. `delete_expired` still runs explicitly so runtime
/// state tied to a given id (live backend clients, held only in-process)
/// can be cleaned up even though Redis evicted the metadata on its own.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    default_ttl_seconds: i64,
}

impl RedisStorage {
    /// Connect to Redis and wrap it as a `Storage` backend. `default_ttl_seconds`
    /// should match the owning `SessionManagerConfig::session_ttl_seconds` so
    /// Redis's own expiry and the sweep's notion of staleness agree.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the client cannot be constructed or the
    /// initial connection cannot be established.
    pub async fn connect(redis_url: &str, default_ttl_seconds: i64) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| StorageError::Backend(err.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(Self {
            conn,
            default_ttl_seconds,
        })
    }

    fn key(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn store(&self, metadata: SessionMetadata) -> Result<(), StorageError> {
        let payload =
            serde_json::to_string(&metadata).map_err(|err| StorageError::Backend(err.to_string()))?;
        let mut conn = self.conn.clone();
        let ttl = self.default_ttl_seconds.max(1) as u64;
        conn.set_ex::<_, _, ()>(Self::key(&metadata.session_id), payload, ttl)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionMetadata>, StorageError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let mut metadata: SessionMetadata =
            serde_json::from_str(&payload).map_err(|err| StorageError::Backend(err.to_string()))?;
        metadata.touch(chrono::Utc::now());
        self.store(metadata.clone()).await?;
        Ok(Some(metadata))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(session_id))
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))
    }

    async fn delete_expired(&self, ttl_seconds: i64) -> Result<Vec<String>, StorageError> {
        // Redis already expires keys natively via set_ex; this scan exists so
        // a caller passing a shorter ttl_seconds than default_ttl_seconds (or
        // one auditing `touched_at` directly) still gets a definitive list of
        // newly-stale ids to release runtime state for.
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;

        let mut expired = Vec::new();
        let now = chrono::Utc::now();
        for key in keys {
            let payload: Option<String> = conn
                .get(&key)
                .await
                .map_err(|err| StorageError::Backend(err.to_string()))?;
            let Some(payload) = payload else { continue };
            let Ok(metadata) = serde_json::from_str::<SessionMetadata>(&payload) else {
                continue;
            };
            let age = now.signed_duration_since(metadata.touched_at);
            if age.num_seconds() >= ttl_seconds {
                conn.del::<_, ()>(&key)
                    .await
                    .map_err(|err| StorageError::Backend(err.to_string()))?;
                expired.push(metadata.session_id);
            }
        }
        Ok(expired)
    }
}
