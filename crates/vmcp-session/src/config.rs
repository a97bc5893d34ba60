//! Typed configuration for the session factory and session manager, using
//! the builder-free plain-struct-with-defaults style of
//! `turbomcp-client::manager::ManagerConfig` — a config value is cheap to
//! construct and override field-by-field via `..Default::default()`.

use std::time::Duration;

/// Configuration for `SessionFactory::make_session`.
#[derive(Debug, Clone)]
pub struct SessionFactoryConfig {
    /// Maximum number of backend clients initialized concurrently.
    pub max_concurrent_init: usize,
    /// Deadline applied to each individual backend's initialization.
    pub per_backend_timeout: Duration,
}

impl Default for SessionFactoryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_init: 10,
            per_backend_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for `SessionManager`.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Global cap on concurrently active sessions. `Generate` fails with
    /// `CapacityExhausted` once this is reached.
    pub max_sessions: usize,
    /// Optional per-identity cap on concurrently active sessions.
    pub max_sessions_per_identity: Option<usize>,
    /// Sliding TTL applied to session metadata; a session untouched for
    /// longer than this is eligible for the expiration sweep.
    pub session_ttl_seconds: i64,
    /// How often the expiration sweep runs.
    pub sweep_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            max_sessions_per_identity: Some(100),
            session_ttl_seconds: 30 * 60,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
