//! The `Session` domain object: owns a routing table and a map of
//! pre-initialized backend clients, and dispatches tool/resource/prompt
//! calls through them.
//!
//! Grounded on the dispatch-by-method-name flow in
//! `turbomcp-proxy/src/proxy/service.rs` and the lock discipline called for
//! by the close/dispatch race: `closed` is set under the write lock before
//! clients are closed, and every dispatch re-checks `closed` after
//! acquiring the read lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use vmcp_backend::BackendClient;
use vmcp_types::{
    Arguments, BackendId, Identity, Prompt, PromptResult, Resource, ResourceResult, RoutingTable,
    SessionError, SessionResult, Tool, ToolResult,
};

struct SessionState {
    closed: bool,
    clients: HashMap<BackendId, Arc<dyn BackendClient>>,
}

/// One authenticated, aggregated MCP session.
///
/// `session_id`, `identity`, and `routing_table` are set once at
/// construction and never mutated afterward; only `closed` and the client
/// map change over the session's lifetime, and both live behind the same
/// `RwLock` so a single lock acquisition observes a consistent view of
/// whether dispatch is still permitted.
pub struct Session {
    session_id: String,
    identity: Identity,
    routing_table: RoutingTable,
    tools: Arc<[Tool]>,
    resources: Arc<[Resource]>,
    prompts: Arc<[Prompt]>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Assemble a session from its already-resolved parts. Only
    /// `SessionFactory::make_session` should call this — it is the only
    /// place the invariant "every routing target has a corresponding
    /// client" is enforced.
    pub(crate) fn new(
        session_id: String,
        identity: Identity,
        routing_table: RoutingTable,
        tools: Vec<Tool>,
        resources: Vec<Resource>,
        prompts: Vec<Prompt>,
        clients: HashMap<BackendId, Arc<dyn BackendClient>>,
    ) -> Self {
        debug_assert!(
            routing_table.referenced_backends().all(|id| clients.contains_key(id)),
            "every routing target must have a corresponding client"
        );
        Self {
            session_id,
            identity,
            routing_table,
            tools: tools.into(),
            resources: resources.into(),
            prompts: prompts.into(),
            state: RwLock::new(SessionState {
                closed: false,
                clients,
            }),
        }
    }

    /// The session's stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// The identity this session was constructed for.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// A defensive copy of every tool this session currently exposes.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.to_vec()
    }

    /// A defensive copy of every resource this session currently exposes.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.resources.to_vec()
    }

    /// A defensive copy of every prompt this session currently exposes.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.to_vec()
    }

    /// Whether the session has been closed. Mostly useful for diagnostics;
    /// dispatch methods already check this internally.
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Invoke a tool by its exposed name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionClosed`] if the session has been
    /// closed, [`SessionError::UnknownTool`] if `exposed_name` does not
    /// resolve, [`SessionError::BackendUnavailable`] if the routed backend's
    /// client is no longer present, or [`SessionError::BackendFailed`] if the
    /// backend itself returned an error.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use vmcp_session::Session;
    /// # use vmcp_types::Arguments;
    /// # fn get_session() -> Session { unimplemented!() }
    /// # tokio_test::block_on(async {
    /// let session = get_session();
    /// let result = session.call_tool("search", Arguments::new()).await?;
    /// println!("tool returned: {:?}", result.content);
    /// # Ok::<(), vmcp_types::SessionError>(())
    /// # });
    /// ```
    pub async fn call_tool(&self, exposed_name: &str, arguments: Arguments) -> SessionResult<ToolResult> {
        let route = self
            .routing_table
            .resolve_tool(exposed_name)
            .ok_or_else(|| SessionError::UnknownTool {
                name: exposed_name.to_string(),
            })?
            .clone();

        let client = self.client_for(&route.backend_id).await?;

        client
            .call_tool(&route.original_name, arguments)
            .await
            .map_err(|err| SessionError::BackendFailed {
                backend_id: route.backend_id.clone(),
                message: err.to_string(),
            })
    }

    /// Read a resource by its exposed URI.
    ///
    /// # Errors
    ///
    /// See [`Session::call_tool`] for the error conditions; `UnknownTool`
    /// becomes `UnknownResource`.
    pub async fn read_resource(&self, exposed_uri: &str) -> SessionResult<ResourceResult> {
        let route = self
            .routing_table
            .resolve_resource(exposed_uri)
            .ok_or_else(|| SessionError::UnknownResource {
                uri: exposed_uri.to_string(),
            })?
            .clone();

        let client = self.client_for(&route.backend_id).await?;

        client
            .read_resource(&route.original_name)
            .await
            .map_err(|err| SessionError::BackendFailed {
                backend_id: route.backend_id.clone(),
                message: err.to_string(),
            })
    }

    /// Fetch a prompt by its exposed name.
    ///
    /// # Errors
    ///
    /// See [`Session::call_tool`] for the error conditions; `UnknownTool`
    /// becomes `UnknownPrompt`.
    pub async fn get_prompt(&self, exposed_name: &str, arguments: Arguments) -> SessionResult<PromptResult> {
        let route = self
            .routing_table
            .resolve_prompt(exposed_name)
            .ok_or_else(|| SessionError::UnknownPrompt {
                name: exposed_name.to_string(),
            })?
            .clone();

        let client = self.client_for(&route.backend_id).await?;

        client
            .get_prompt(&route.original_name, arguments)
            .await
            .map_err(|err| SessionError::BackendFailed {
                backend_id: route.backend_id.clone(),
                message: err.to_string(),
            })
    }

    /// Look up the client for a resolved route, failing fast if the
    /// session has already been closed or if the routed backend's client
    /// is no longer present (e.g. it was never successfully initialized).
    async fn client_for(&self, backend_id: &BackendId) -> SessionResult<Arc<dyn BackendClient>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(SessionError::SessionClosed {
                session_id: self.session_id.clone(),
            });
        }
        state
            .clients
            .get(backend_id)
            .cloned()
            .ok_or_else(|| SessionError::BackendUnavailable {
                backend_id: backend_id.clone(),
            })
    }

    /// Close the session. Idempotent: a second call observes `closed` and
    /// returns `Ok(())` immediately without touching any client again.
    ///
    /// `closed` is set to `true` under the write lock before any client's
    /// `close` is awaited, so a dispatch that acquires the read lock after
    /// this point — even one already in flight when `close` started
    /// draining clients — will see `closed` and fail fast rather than race
    /// against a client mid-shutdown. Every owned client is closed
    /// regardless of whether earlier ones failed; failures are collected
    /// into a single combined error rather than aborting the teardown.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CloseFailed`] if any owned client's `close`
    /// returned an error. The session is fully torn down either way.
    pub async fn close(&self) -> SessionResult<()> {
        let clients = {
            let mut state = self.state.write().await;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.clients)
        };

        let mut failures = Vec::new();
        for (backend_id, client) in clients {
            tracing::debug!(session_id = %self.session_id, %backend_id, "closing backend client");
            if let Err(err) = client.close().await {
                tracing::warn!(session_id = %self.session_id, %backend_id, error = %err, "backend client failed to close");
                failures.push((backend_id, err.to_string()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::CloseFailed { failures })
        }
    }
}
