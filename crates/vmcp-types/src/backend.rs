//! Backend identity and configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a backend workload within a session.
///
/// Newtype around `String` so routing tables and client maps can't be
/// accidentally keyed by an `exposed_name` or `original_name` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendId(pub String);

impl BackendId {
    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for BackendId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// Minimal description of a backend MCP server a session should connect to.
///
/// Transport specifics and authentication material are intentionally left as
/// an opaque blob: the transport itself is provided by the external
/// `BackendClient` collaborator, not constructed here.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Stable workload identifier, unique within the set passed to one
    /// `SessionFactory::make_session` call.
    pub id: BackendId,
    /// Opaque transport target (e.g. a URL, a command line, a socket path)
    /// interpreted by whichever `BackendClient` factory the host supplies.
    pub transport_target: String,
    /// Opaque authentication material for this backend, if any.
    pub auth: Option<String>,
}

impl BackendDescriptor {
    /// Construct a descriptor with no authentication material.
    #[must_use]
    pub fn new(id: impl Into<BackendId>, transport_target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transport_target: transport_target.into(),
            auth: None,
        }
    }

    /// Attach authentication material to this descriptor.
    #[must_use]
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }
}
