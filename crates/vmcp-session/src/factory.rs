//! `SessionFactory`: turns an `(identity, backends)` pair into a
//! fully-formed [`crate::session::Session`].
//!
//! Bounded parallel initialization is grounded on the connection-pool
//! shape of `turbomcp-client::manager::ManagerConfig` (`max_connections`),
//! generalized from a connection pool cap to a concurrent-initialization
//! cap via a `tokio::sync::Semaphore`.

use crate::config::SessionFactoryConfig;
use crate::session::Session;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;
use vmcp_backend::{Aggregator, BackendCapabilities, BackendClientFactory};
use vmcp_types::{BackendDescriptor, BackendId, Identity, SessionError, SessionResult};

/// Builds sessions from backend descriptors, bounding how many backend
/// connections are established concurrently and applying a per-backend
/// initialization deadline.
pub struct SessionFactory<F, A> {
    client_factory: Arc<F>,
    aggregator: Arc<A>,
    config: SessionFactoryConfig,
}

impl<F, A> SessionFactory<F, A>
where
    F: BackendClientFactory + 'static,
    A: Aggregator,
{
    /// Construct a factory from its collaborators and configuration.
    pub fn new(client_factory: Arc<F>, aggregator: Arc<A>, config: SessionFactoryConfig) -> Self {
        Self {
            client_factory,
            aggregator,
            config,
        }
    }

    /// Build a fully-formed session.
    ///
    /// Per-backend failures (connection error or deadline exceeded) are
    /// logged and the backend is simply omitted from the resulting
    /// session — even if every backend fails, this still returns `Ok` with
    /// an empty-capability session, because the caller (the SDK's
    /// registration hook) has no channel to propagate a mid-registration
    /// error. The only case this returns `Err` is construction not running
    /// at all, i.e. the supplied `cancellation` was already triggered, or a
    /// backend id was duplicated in `backends`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicateBackend`] if `backends` repeats a
    /// backend id, or [`SessionError::Initialization`] if `cancellation`
    /// fires before any backend connects.
    pub async fn make_session(
        &self,
        identity: Identity,
        backends: Vec<BackendDescriptor>,
        cancellation: Option<tokio_util::sync::CancellationToken>,
    ) -> SessionResult<Session> {
        self.build_session(Uuid::new_v4().to_string(), identity, backends, cancellation)
            .await
    }

    /// Rebuild a session's runtime state under its original `session_id`,
    /// for a cold instance that received a sticky-session migration and
    /// found metadata but no resident [`Session`]. Otherwise identical to
    /// [`SessionFactory::make_session`].
    ///
    /// # Errors
    ///
    /// See [`SessionFactory::make_session`].
    pub async fn rehydrate_session(
        &self,
        session_id: String,
        identity: Identity,
        backends: Vec<BackendDescriptor>,
        cancellation: Option<tokio_util::sync::CancellationToken>,
    ) -> SessionResult<Session> {
        self.build_session(session_id, identity, backends, cancellation).await
    }

    async fn build_session(
        &self,
        session_id: String,
        identity: Identity,
        backends: Vec<BackendDescriptor>,
        cancellation: Option<tokio_util::sync::CancellationToken>,
    ) -> SessionResult<Session> {
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.id.clone()) {
                return Err(SessionError::DuplicateBackend {
                    backend_id: backend.id.clone(),
                });
            }
        }

        if let Some(token) = &cancellation {
            if token.is_cancelled() {
                return Err(SessionError::Initialization {
                    message: "construction cancelled before any backend connected".to_string(),
                });
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_init.max(1)));
        let per_backend_timeout = self.config.per_backend_timeout;

        let init_futures = backends.into_iter().map(|descriptor| {
            let semaphore = semaphore.clone();
            let client_factory = self.client_factory.clone();
            let cancellation = cancellation.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");

                if let Some(token) = &cancellation {
                    if token.is_cancelled() {
                        return (descriptor.id, None);
                    }
                }

                match tokio::time::timeout(per_backend_timeout, client_factory.connect(&descriptor)).await {
                    Ok(Ok(client)) => (descriptor.id, Some(client)),
                    Ok(Err(err)) => {
                        tracing::warn!(backend_id = %descriptor.id, error = %err, "backend initialization failed");
                        (descriptor.id, None)
                    }
                    Err(_) => {
                        tracing::warn!(backend_id = %descriptor.id, "backend initialization exceeded deadline");
                        (descriptor.id, None)
                    }
                }
            }
        });

        let initialized = join_all(init_futures).await;

        if let Some(token) = &cancellation {
            if token.is_cancelled() {
                for (backend_id, client) in &initialized {
                    if let Some(client) = client {
                        if let Err(err) = client.close().await {
                            tracing::warn!(%backend_id, error = %err, "failed to close client during cancelled construction");
                        }
                    }
                }
                return Err(SessionError::Initialization {
                    message: "construction cancelled mid-initialization".to_string(),
                });
            }
        }

        let mut clients = HashMap::new();
        for (backend_id, client) in initialized {
            if let Some(client) = client {
                clients.insert(backend_id, client);
            }
        }

        let mut per_backend_capabilities = Vec::new();
        for (backend_id, client) in &clients {
            per_backend_capabilities.push(BackendCapabilities {
                backend_id: backend_id.clone(),
                tools: client.list_tools().await.unwrap_or_default(),
                resources: client.list_resources().await.unwrap_or_default(),
                prompts: client.list_prompts().await.unwrap_or_default(),
            });
        }

        let aggregated = self.aggregator.aggregate(per_backend_capabilities);

        Ok(Session::new(
            session_id,
            identity,
            aggregated.routing,
            aggregated.tools,
            aggregated.resources,
            aggregated.prompts,
            clients,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vmcp_backend::mock::MockBackendClientFactory;
    use vmcp_backend::{PrefixAggregator, RawTool};

    fn factory(client_factory: MockBackendClientFactory) -> SessionFactory<MockBackendClientFactory, PrefixAggregator> {
        SessionFactory::new(
            Arc::new(client_factory),
            Arc::new(PrefixAggregator::new()),
            SessionFactoryConfig::default(),
        )
    }

    #[tokio::test]
    async fn zero_backends_yields_empty_session() {
        let f = factory(MockBackendClientFactory::new());
        let session = f.make_session(Identity::new("u"), vec![], None).await.unwrap();
        assert!(session.tools().is_empty());
        let err = session
            .call_tool("anything", vmcp_types::Arguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn duplicate_backend_id_is_rejected() {
        let f = factory(MockBackendClientFactory::new());
        let backends = vec![
            BackendDescriptor::new("a", "target-1"),
            BackendDescriptor::new("a", "target-2"),
        ];
        let err = f.make_session(Identity::new("u"), backends, None).await.unwrap_err();
        assert!(matches!(err, SessionError::DuplicateBackend { .. }));
    }

    #[tokio::test]
    async fn partial_init_failure_omits_failed_backend_only() {
        let client_factory = MockBackendClientFactory::new()
            .with_tools(
                "a",
                vec![RawTool {
                    name: "ga".to_string(),
                    description: None,
                    input_schema: None,
                }],
            )
            .with_failure("b");

        let f = factory(client_factory);
        let backends = vec![BackendDescriptor::new("a", "t1"), BackendDescriptor::new("b", "t2")];
        let session = f.make_session(Identity::new("u"), backends, None).await.unwrap();

        let names: Vec<_> = session.tools().into_iter().map(|t| t.exposed_name).collect();
        assert_eq!(names, vec!["ga".to_string()]);

        let err = session
            .call_tool("gb", vmcp_types::Arguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn slow_backend_exceeding_deadline_is_dropped() {
        let mut config = SessionFactoryConfig::default();
        config.per_backend_timeout = Duration::from_millis(20);

        let client_factory = MockBackendClientFactory::new().with_delay("slow", Duration::from_millis(200));
        let f = SessionFactory::new(Arc::new(client_factory), Arc::new(PrefixAggregator::new()), config);

        let backends = vec![BackendDescriptor::new("slow", "t1")];
        let session = f.make_session(Identity::new("u"), backends, None).await.unwrap();
        assert!(session.tools().is_empty());
    }

    #[tokio::test]
    async fn all_backends_failing_still_yields_a_valid_session() {
        let client_factory = MockBackendClientFactory::new().with_failure("a").with_failure("b");
        let f = factory(client_factory);
        let backends = vec![BackendDescriptor::new("a", "t1"), BackendDescriptor::new("b", "t2")];
        let session = f.make_session(Identity::new("u"), backends, None).await.unwrap();
        assert!(session.tools().is_empty());
        assert!(session.resources().is_empty());
        assert!(session.prompts().is_empty());
    }

    #[tokio::test]
    async fn already_cancelled_token_fails_construction_before_connecting() {
        let f = factory(MockBackendClientFactory::new());
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();

        let backends = vec![BackendDescriptor::new("a", "t1")];
        let err = f
            .make_session(Identity::new("u"), backends, Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Initialization { .. }));
    }

    #[tokio::test]
    async fn cancellation_mid_initialization_closes_partial_clients_and_errors() {
        let client_factory = MockBackendClientFactory::new().with_delay("slow", Duration::from_millis(100));
        let f = factory(client_factory);
        let token = tokio_util::sync::CancellationToken::new();

        let backends = vec![BackendDescriptor::new("slow", "t1")];
        let cancel_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_token.cancel();
        });

        let err = f
            .make_session(Identity::new("u"), backends, Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Initialization { .. }));
    }
}
