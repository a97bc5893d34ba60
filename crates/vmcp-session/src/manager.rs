//! `SessionManager`: the protocol-level bridge between domain `Session`s and
//! an external SDK's `SessionIdManager` contract.
//!
//! Grounded on the registration/lookup/dispatch flow in
//! `turbomcp-proxy/src/proxy/service.rs`, the per-tenant bookkeeping in
//! `turbomcp-server/src/middleware/tenancy.rs` (generalized from tenants to
//! identities), and the expiration-sweep shape of
//! `turbomcp-server/src/task_storage.rs::TaskStorage::start_cleanup`.

use crate::config::SessionManagerConfig;
use crate::factory::SessionFactory;
use crate::session::Session;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vmcp_backend::{Aggregator, BackendClientFactory};
use vmcp_storage::Storage;
use vmcp_types::{hash_token, BackendDescriptor, Identity, SessionError, SessionMetadata, SessionResult, SessionStatus};

/// Two-phase session creation as imposed by an external SDK whose
/// `Generate()` has no request context: `generate` mints an id and a
/// pending metadata record synchronously; `populate`, called later from a
/// context-bearing hook, does the real construction work.
#[async_trait::async_trait]
pub trait SessionIdManager: Send + Sync {
    /// Phase one: mint a session id and write a placeholder record.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityExhausted`] if the global session cap
    /// has been reached.
    async fn generate(&self) -> SessionResult<String>;

    /// Consult storage for `session_id`; returns an error rather than a
    /// boolean per `spec.md`-style `Validate` semantics, since most callers
    /// need to distinguish not-found from expired.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] or
    /// [`SessionError::SessionExpired`] if the session cannot be validated.
    async fn validate(&self, session_id: &str) -> SessionResult<()>;

    /// Terminate a session: close its runtime state (if any) and remove its
    /// metadata. Idempotent — terminating an unknown id is not an error.
    async fn terminate(&self, session_id: &str) -> SessionResult<()>;
}

/// Bridges [`Session`]/[`SessionFactory`] to an external SDK's session
/// lifecycle contract, backed by a pluggable [`Storage`] for metadata and a
/// process-local registry for runtime state.
pub struct SessionManager<F, A, S> {
    storage: Arc<S>,
    factory: SessionFactory<F, A>,
    config: SessionManagerConfig,
    runtime: DashMap<String, Arc<Session>>,
    identity_counts: DashMap<String, usize>,
    active_count: AtomicUsize,
}

impl<F, A, S> SessionManager<F, A, S>
where
    F: BackendClientFactory + 'static,
    A: Aggregator,
    S: Storage,
{
    /// Construct a manager from its collaborators and configuration.
    pub fn new(storage: Arc<S>, factory: SessionFactory<F, A>, config: SessionManagerConfig) -> Self {
        Self {
            storage,
            factory,
            config,
            runtime: DashMap::new(),
            identity_counts: DashMap::new(),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Phase two of creation, invoked from the SDK's registration hook
    /// (which has request context, unlike `Generate`). Builds the runtime
    /// session, replaces the placeholder metadata with a populated record,
    /// and indexes the session in the process-local registry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityExhausted`] if the per-identity cap
    /// would be exceeded, [`SessionError::SessionNotFound`] if `session_id`
    /// was never generated, or any error [`SessionFactory::make_session`]
    /// itself returns.
    pub async fn populate(
        &self,
        session_id: &str,
        identity: Identity,
        backends: Vec<BackendDescriptor>,
        cancellation: Option<CancellationToken>,
    ) -> SessionResult<Arc<Session>> {
        let existing = self
            .storage
            .load(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        if existing.status != SessionStatus::Pending {
            return Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }

        if let Some(max_per_identity) = self.config.max_sessions_per_identity {
            let mut count = self.identity_counts.entry(identity.subject.clone()).or_insert(0);
            if *count >= max_per_identity {
                return Err(SessionError::CapacityExhausted);
            }
            *count += 1;
        }

        let token_hash = identity.token_hash();
        let backend_ids: Vec<_> = backends.iter().map(|b| b.id.clone()).collect();

        let session = match self.factory.make_session(identity.clone(), backends, cancellation).await {
            Ok(session) => session,
            Err(err) => {
                self.release_identity_slot(&identity.subject);
                return Err(err);
            }
        };

        let mut metadata = existing;
        metadata.populate(identity.subject.clone(), backend_ids, token_hash, Utc::now());
        self.storage
            .store(metadata)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?;

        let session = Arc::new(session);
        self.runtime.insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    /// Rebuild the runtime `Session` for metadata that is already `Active`
    /// but has no resident runtime state on this instance — the cold-start
    /// path after a sticky-session migration, where [`SessionManager::lookup`]
    /// returned `None` for an otherwise-valid session id. Does not touch the
    /// per-identity cap: that slot was reserved when the session was first
    /// populated and is released once, on [`SessionManager::terminate`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if no metadata exists for
    /// `session_id` or it is not `Active`, or any error
    /// [`SessionFactory::make_session`] itself returns.
    pub async fn rehydrate(
        &self,
        session_id: &str,
        identity: Identity,
        backends: Vec<BackendDescriptor>,
        cancellation: Option<CancellationToken>,
    ) -> SessionResult<Arc<Session>> {
        let existing = self
            .storage
            .load(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        if existing.status != SessionStatus::Active {
            return Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }

        let session = self
            .factory
            .rehydrate_session(session_id.to_string(), identity, backends, cancellation)
            .await?;

        let mut metadata = existing;
        metadata.touch(Utc::now());
        self.storage
            .store(metadata)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?;

        let session = Arc::new(session);
        self.runtime.insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    /// Resolve a session id to its in-process runtime `Session`, if still
    /// resident. Used by dispatch handlers on the fast path; a `None`
    /// result on an otherwise-valid session id means a cold instance is
    /// serving the request after a sticky-session migration and the host
    /// must re-populate before dispatching.
    #[must_use]
    pub fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        self.runtime.get(session_id).map(|entry| entry.clone())
    }

    /// Re-hash a presented bearer token and compare it against the bound
    /// hash in the session's metadata. A mismatch indicates the session id
    /// is being replayed with different credentials; the session is
    /// terminated as a side effect and an error returned, per the
    /// rebinding-rejection requirement.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionExpired`] if the presented token's
    /// hash does not match the bound hash, after terminating the session.
    pub async fn check_token_binding(&self, session_id: &str, bearer_token: Option<&str>) -> SessionResult<()> {
        let Some(metadata) = self
            .storage
            .load(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?
        else {
            return Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        };

        let Some(bound_hash) = &metadata.token_hash else {
            return Ok(());
        };

        let presented_hash = bearer_token.map(hash_token);
        if presented_hash.as_deref() != Some(bound_hash.as_str()) {
            self.terminate(session_id).await?;
            return Err(SessionError::SessionExpired {
                session_id: session_id.to_string(),
            });
        }

        Ok(())
    }

    /// Run one pass of the expiration sweep: ask storage which records have
    /// exceeded the configured TTL, close the corresponding runtime
    /// sessions, and drop them from the registry.
    pub async fn sweep_expired(&self) {
        let expired = match self.storage.delete_expired(self.config.session_ttl_seconds).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(error = %err, "session metadata sweep failed");
                return;
            }
        };

        for session_id in expired {
            self.evict(&session_id).await;
            self.active_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Spawn the background expiration sweep loop. Returns the join handle
    /// so callers can abort it on shutdown.
    pub fn start_sweep(self: Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        F: 'static,
        A: 'static,
        S: 'static,
    {
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_expired().await;
            }
        })
    }

    /// Close and drop the in-process runtime session, if one is resident.
    /// Does not touch the global active-session counter — callers decide
    /// whether the corresponding metadata existed and should be counted.
    async fn evict(&self, session_id: &str) {
        if let Some((_, session)) = self.runtime.remove(session_id) {
            if let Err(err) = session.close().await {
                tracing::warn!(session_id = %session_id, error = %err, "session close reported backend errors");
            }
            self.release_identity_slot(session.identity().subject.as_str());
        }
    }

    fn release_identity_slot(&self, identity_subject: &str) {
        if let Some(mut count) = self.identity_counts.get_mut(identity_subject) {
            *count = count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionFactoryConfig, SessionManagerConfig};
    use std::time::Duration;
    use vmcp_backend::mock::MockBackendClientFactory;
    use vmcp_backend::PrefixAggregator;
    use vmcp_storage::InMemoryStorage;

    fn manager(
        config: SessionManagerConfig,
    ) -> SessionManager<MockBackendClientFactory, PrefixAggregator, InMemoryStorage> {
        SessionManager::new(
            Arc::new(InMemoryStorage::new()),
            SessionFactory::new(
                Arc::new(MockBackendClientFactory::new()),
                Arc::new(PrefixAggregator::new()),
                SessionFactoryConfig::default(),
            ),
            config,
        )
    }

    #[tokio::test]
    async fn generate_then_terminate_without_populate_leaves_no_orphaned_state() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();
        assert!(m.storage.load(&id).await.unwrap().is_some());

        m.terminate(&id).await.unwrap();

        assert!(m.storage.load(&id).await.unwrap().is_none());
        assert!(m.lookup(&id).is_none());
        assert_eq!(m.active_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminate_unknown_id_is_not_an_error() {
        let m = manager(SessionManagerConfig::default());
        m.terminate("never-generated").await.unwrap();
    }

    #[tokio::test]
    async fn populate_after_terminate_fails_cleanly() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();
        m.terminate(&id).await.unwrap();

        let err = m
            .populate(&id, Identity::new("user-1"), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound { .. }));
        assert!(m.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn generate_then_populate_activates_metadata_and_registers_runtime_session() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();

        let session = m
            .populate(&id, Identity::new("user-1"), vec![BackendDescriptor::new("a", "t1")], None)
            .await
            .unwrap();
        assert_eq!(session.id(), id);

        let metadata = m.storage.load(&id).await.unwrap().unwrap();
        assert_eq!(metadata.status, SessionStatus::Active);
        assert_eq!(metadata.identity_ref, "user-1");
        assert!(m.lookup(&id).is_some());
    }

    #[tokio::test]
    async fn populate_on_never_generated_id_fails() {
        let m = manager(SessionManagerConfig::default());
        let err = m
            .populate("made-up-id", Identity::new("user-1"), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn generate_reports_capacity_exhausted_once_global_cap_reached() {
        let mut config = SessionManagerConfig::default();
        config.max_sessions = 1;
        let m = manager(config);

        m.generate().await.unwrap();
        let err = m.generate().await.unwrap_err();
        assert!(matches!(err, SessionError::CapacityExhausted));
    }

    #[tokio::test]
    async fn per_identity_cap_is_enforced_at_populate() {
        let mut config = SessionManagerConfig::default();
        config.max_sessions_per_identity = Some(1);
        let m = manager(config);

        let id1 = m.generate().await.unwrap();
        m.populate(&id1, Identity::new("user-1"), vec![], None).await.unwrap();

        let id2 = m.generate().await.unwrap();
        let err = m
            .populate(&id2, Identity::new("user-1"), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::CapacityExhausted));
    }

    #[tokio::test]
    async fn token_binding_mismatch_terminates_session_and_rejects_future_validation() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();
        m.populate(&id, Identity::with_bearer_token("user-1", "token-a"), vec![], None)
            .await
            .unwrap();

        let err = m
            .check_token_binding(&id, Some("token-b"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired { .. }));

        let validate_err = m.validate(&id).await.unwrap_err();
        assert!(matches!(validate_err, SessionError::SessionNotFound { .. }));
        assert!(m.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn token_binding_match_leaves_session_active() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();
        m.populate(&id, Identity::with_bearer_token("user-1", "token-a"), vec![], None)
            .await
            .unwrap();

        m.check_token_binding(&id, Some("token-a")).await.unwrap();
        m.validate(&id).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_expired_closes_runtime_session_and_drops_it_from_registry() {
        let mut config = SessionManagerConfig::default();
        config.session_ttl_seconds = 0;
        let m = manager(config);

        let id = m.generate().await.unwrap();
        m.populate(&id, Identity::new("user-1"), vec![], None).await.unwrap();
        assert!(m.lookup(&id).is_some());

        tokio::time::sleep(Duration::from_millis(5)).await;
        m.sweep_expired().await;

        assert!(m.lookup(&id).is_none());
        assert!(m.storage.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rehydrate_rebuilds_runtime_state_for_a_cold_instance() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();
        m.populate(&id, Identity::new("user-1"), vec![BackendDescriptor::new("a", "t1")], None)
            .await
            .unwrap();

        // simulate a cold instance: metadata exists, nothing resident.
        m.runtime.remove(&id);
        assert!(m.lookup(&id).is_none());

        let session = m
            .rehydrate(&id, Identity::new("user-1"), vec![BackendDescriptor::new("a", "t1")], None)
            .await
            .unwrap();
        assert_eq!(session.id(), id);
        assert!(m.lookup(&id).is_some());
    }

    #[tokio::test]
    async fn rehydrate_on_pending_metadata_is_rejected() {
        let m = manager(SessionManagerConfig::default());
        let id = m.generate().await.unwrap();

        let err = m
            .rehydrate(&id, Identity::new("user-1"), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn rehydrate_does_not_double_count_the_per_identity_cap() {
        let mut config = SessionManagerConfig::default();
        config.max_sessions_per_identity = Some(1);
        let m = manager(config);

        let id = m.generate().await.unwrap();
        m.populate(&id, Identity::new("user-1"), vec![], None).await.unwrap();
        m.runtime.remove(&id);

        m.rehydrate(&id, Identity::new("user-1"), vec![], None).await.unwrap();

        let other_id = m.generate().await.unwrap();
        let err = m
            .populate(&other_id, Identity::new("user-1"), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::CapacityExhausted));
    }
}

#[async_trait::async_trait]
impl<F, A, S> SessionIdManager for SessionManager<F, A, S>
where
    F: BackendClientFactory + 'static,
    A: Aggregator + Send + Sync,
    S: Storage,
{
    async fn generate(&self) -> SessionResult<String> {
        if self.active_count.fetch_add(1, Ordering::SeqCst) >= self.config.max_sessions {
            self.active_count.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionError::CapacityExhausted);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let metadata = SessionMetadata::pending(session_id.clone(), Utc::now());
        self.storage
            .store(metadata)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?;

        Ok(session_id)
    }

    async fn validate(&self, session_id: &str) -> SessionResult<()> {
        let metadata = self
            .storage
            .load(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?;

        match metadata {
            Some(metadata) if metadata.status == SessionStatus::Active => Ok(()),
            Some(_) => Err(SessionError::SessionExpired {
                session_id: session_id.to_string(),
            }),
            None => Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    async fn terminate(&self, session_id: &str) -> SessionResult<()> {
        let existed = self
            .storage
            .load(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?
            .is_some();

        self.evict(session_id).await;

        self.storage
            .delete(session_id)
            .await
            .map_err(|err| SessionError::Storage {
                message: err.to_string(),
            })?;

        if existed {
            self.active_count.fetch_sub(1, Ordering::SeqCst);
        }

        Ok(())
    }
}
