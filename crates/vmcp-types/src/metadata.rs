//! Persisted session metadata — the cross-instance "handle" half of a
//! session's dual-layer storage model. This is the serializable record a
//! `Storage` backend keeps; it never carries live backend clients.

use crate::backend::BackendId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session's metadata record.
///
/// `pending` exists only between `SessionManager::generate` and
/// `SessionManager::populate`'s two-phase creation; a record should never
/// observably remain `pending` once `populate` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Placeholder written by phase one (`Generate`), before runtime state
    /// exists.
    Pending,
    /// Fully populated and serving dispatch.
    Active,
}

/// Persisted session metadata. This is the only artifact that crosses
/// process/instance boundaries; it is never sufficient on its own to serve a
/// dispatch — see [`crate::error::SessionError`] for what a cold instance
/// does when it finds metadata but no runtime session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Opaque session identifier, unique across active sessions.
    pub session_id: String,
    /// Fixed type tag; always `"vmcp"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the metadata record was first written.
    pub created_at: DateTime<Utc>,
    /// Last time this record was read or written; sliding TTL anchor.
    pub touched_at: DateTime<Utc>,
    /// Opaque reference to the authenticated identity this session belongs
    /// to (typically the `Identity::subject`).
    pub identity_ref: String,
    /// Backend ids this session was constructed with.
    pub backend_ids: Vec<BackendId>,
    /// Hex-encoded SHA-256 of the bearer token presented at populate time,
    /// if token-hash binding is enabled.
    pub token_hash: Option<String>,
    /// Current lifecycle status.
    pub status: SessionStatus,
}

impl SessionMetadata {
    /// Construct a fresh "pending" placeholder record (`SessionManager`
    /// phase one).
    #[must_use]
    pub fn pending(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            kind: "vmcp".to_string(),
            created_at: now,
            touched_at: now,
            identity_ref: String::new(),
            backend_ids: Vec::new(),
            token_hash: None,
            status: SessionStatus::Pending,
        }
    }

    /// Promote a pending record to `active`, filling in the fields only
    /// known once `SessionFactory::make_session` has run.
    pub fn populate(
        &mut self,
        identity_ref: impl Into<String>,
        backend_ids: Vec<BackendId>,
        token_hash: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.identity_ref = identity_ref.into();
        self.backend_ids = backend_ids;
        self.token_hash = token_hash;
        self.status = SessionStatus::Active;
        self.touched_at = now;
    }

    /// Touch the record, extending its sliding TTL.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.touched_at = now;
    }
}
