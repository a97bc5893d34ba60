//! Authenticated principal passed into session construction.

use sha2::{Digest, Sha256};

/// An opaque authenticated principal bound to a session at construction time.
///
/// Set once and never mutated for the lifetime of the session. The optional
/// `bearer_token` is never persisted in the clear — only its SHA-256 hash is
/// ever written to session metadata, via [`Identity::token_hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable subject identifier for the authenticated principal.
    pub subject: String,
    /// The bearer token presented at session creation, if any.
    ///
    /// Held only in memory for the duration of construction; callers should
    /// not retain it beyond computing [`Identity::token_hash`].
    pub bearer_token: Option<String>,
}

impl Identity {
    /// Construct an identity with no token-hash binding.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            bearer_token: None,
        }
    }

    /// Construct an identity carrying a bearer token for session-hijack
    /// prevention via token-hash binding.
    #[must_use]
    pub fn with_bearer_token(subject: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            bearer_token: Some(bearer_token.into()),
        }
    }

    /// Hex-encoded SHA-256 of the bearer token, if one was presented.
    #[must_use]
    pub fn token_hash(&self) -> Option<String> {
        self.bearer_token.as_deref().map(hash_token)
    }
}

/// Hash a presented bearer token the same way a populated session's
/// `token_hash` was computed, so the two can be compared when deciding
/// whether to reject a rebinding attempt.
#[must_use]
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_deterministic() {
        let a = Identity::with_bearer_token("user-1", "secret-token");
        let b = Identity::with_bearer_token("user-1", "secret-token");
        assert_eq!(a.token_hash(), b.token_hash());
    }

    #[test]
    fn different_tokens_hash_differently() {
        let a = Identity::with_bearer_token("user-1", "token-a");
        let b = Identity::with_bearer_token("user-1", "token-b");
        assert_ne!(a.token_hash(), b.token_hash());
    }

    #[test]
    fn no_token_means_no_hash() {
        let identity = Identity::new("user-1");
        assert_eq!(identity.token_hash(), None);
    }
}
