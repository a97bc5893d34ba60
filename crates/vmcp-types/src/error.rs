//! Session-core error taxonomy.
//!
//! Follows the layered, `#[non_exhaustive]` `thiserror` enum pattern used by
//! `turbomcp-proxy::error::ProxyError` and `turbomcp-server::error::ServerError`:
//! one variant per abstract error kind, constructor helpers, a `sanitize()`
//! method for client-facing redaction, and an `is_retryable()` predicate.

use crate::backend::BackendId;

/// Result type used throughout the vMCP session core.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Abstract error kinds surfaced by the vMCP session core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// No metadata exists for this session id.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The id that was looked up.
        session_id: String,
    },

    /// Metadata exists but the session is marked terminated or its TTL has
    /// elapsed.
    #[error("session expired: {session_id}")]
    SessionExpired {
        /// The id that was looked up.
        session_id: String,
    },

    /// Dispatch arrived after `Session::close` had already begun.
    #[error("session closed: {session_id}")]
    SessionClosed {
        /// The session that was closed.
        session_id: String,
    },

    /// Routing lookup failed for a tool name.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The exposed name that failed to resolve.
        name: String,
    },

    /// Routing lookup failed for a resource URI.
    #[error("unknown resource: {uri}")]
    UnknownResource {
        /// The exposed URI that failed to resolve.
        uri: String,
    },

    /// Routing lookup failed for a prompt name.
    #[error("unknown prompt: {name}")]
    UnknownPrompt {
        /// The exposed name that failed to resolve.
        name: String,
    },

    /// The routing table names a backend whose client is missing or closed.
    #[error("backend unavailable: {backend_id}")]
    BackendUnavailable {
        /// The backend that could not serve the request.
        backend_id: BackendId,
    },

    /// The backend returned an error for an otherwise well-routed call.
    #[error("backend {backend_id} failed: {message}")]
    BackendFailed {
        /// The backend that returned the error.
        backend_id: BackendId,
        /// The backend's error message, propagated verbatim.
        message: String,
    },

    /// The session or per-identity cap was reached at creation time.
    #[error("capacity exhausted")]
    CapacityExhausted,

    /// `SessionFactory::make_session` could not run at all (e.g. the
    /// provided context was already cancelled).
    #[error("session initialization failed: {message}")]
    Initialization {
        /// Description of why construction could not proceed.
        message: String,
    },

    /// The same backend id appeared more than once in a `make_session`
    /// call.
    #[error("duplicate backend id: {backend_id}")]
    DuplicateBackend {
        /// The id that was supplied more than once.
        backend_id: BackendId,
    },

    /// A storage backend failed to complete an operation.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the underlying storage failure.
        message: String,
    },

    /// One or more owned backend clients failed to close cleanly. Never
    /// blocks teardown: `Session::close` still marks the session closed and
    /// drops every client before returning this.
    #[error("{} backend client(s) failed to close", failures.len())]
    CloseFailed {
        /// `(backend_id, message)` for every client whose close failed.
        failures: Vec<(BackendId, String)>,
    },
}

impl SessionError {
    /// Message safe to return across the protocol boundary: internal detail
    /// (e.g. a storage backend's connection string) is stripped, mirroring
    /// `turbomcp_proxy::ProxyError::sanitize`.
    #[must_use]
    pub fn sanitize(&self) -> String {
        match self {
            Self::SessionNotFound { .. } => "session not found".to_string(),
            Self::SessionExpired { .. } => "session expired".to_string(),
            Self::SessionClosed { .. } => "session closed".to_string(),
            Self::UnknownTool { name } => format!("unknown tool: {name}"),
            Self::UnknownResource { uri } => format!("unknown resource: {uri}"),
            Self::UnknownPrompt { name } => format!("unknown prompt: {name}"),
            Self::BackendUnavailable { backend_id } => {
                format!("backend unavailable: {backend_id}")
            }
            Self::BackendFailed { backend_id, .. } => {
                format!("backend {backend_id} returned an error")
            }
            Self::CapacityExhausted => "capacity exhausted".to_string(),
            Self::Initialization { .. } => "session initialization failed".to_string(),
            Self::DuplicateBackend { backend_id } => {
                format!("duplicate backend id: {backend_id}")
            }
            Self::Storage { .. } => "storage error".to_string(),
            Self::CloseFailed { failures } => {
                format!("{} backend client(s) failed to close", failures.len())
            }
        }
    }

    /// Whether a client seeing this error could reasonably retry the same
    /// request without any other action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::Storage { .. } | Self::CapacityExhausted
        )
    }

    /// Whether this error indicates the client should re-initialize a new
    /// session entirely, rather than retry.
    #[must_use]
    pub fn requires_reinitialize(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. } | Self::SessionExpired { .. } | Self::SessionClosed { .. }
        )
    }
}
