//! The `Storage` contract: a pluggable backend for persisted session
//! metadata, deliberately mirroring `turbomcp-server`'s `TaskStorage` shape
//! (create/get/update/sweep-by-TTL) but generalized behind a trait so an
//! in-memory map and a distributed store (Redis, etc.) can both serve it.

use async_trait::async_trait;
use vmcp_types::SessionMetadata;

/// Error surfaced by a `Storage` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend itself failed (connection drop, serialization error).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Pluggable storage for session metadata records.
///
/// Implementations only ever see the serializable [`SessionMetadata`] half
/// of a session — never live backend clients — so the same trait can be
/// backed by a process-local map or a shared external store without the
/// session layer caring which.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a metadata record, overwriting any existing record with the
    /// same `session_id`.
    async fn store(&self, metadata: SessionMetadata) -> Result<(), StorageError>;

    /// Load a metadata record by id, touching it (extending its sliding
    /// TTL) as a side effect if it exists.
    async fn load(&self, session_id: &str) -> Result<Option<SessionMetadata>, StorageError>;

    /// Remove a metadata record, if one exists. Never an error if the
    /// record is already absent.
    async fn delete(&self, session_id: &str) -> Result<(), StorageError>;

    /// Sweep every record whose sliding TTL has elapsed and remove it,
    /// returning the ids that were deleted so the caller can release any
    /// runtime state (live backend clients) keyed by those same ids.
    async fn delete_expired(&self, ttl_seconds: i64) -> Result<Vec<String>, StorageError>;
}
