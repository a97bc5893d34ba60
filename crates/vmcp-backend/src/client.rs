//! The `BackendClient` contract: a live, process-local connection to one
//! backend MCP server.
//!
//! Mirrors the method surface of `turbomcp-proxy`'s `BackendConnector`
//! (`list_tools`/`list_resources`/`list_prompts`/`call_tool`/`read_resource`/
//! `get_prompt`) but stays transport-agnostic: construction and connection
//! establishment are the caller's responsibility, not this trait's. A
//! session only ever sees an already-initialized client.

use crate::aggregate::{RawPrompt, RawResource, RawTool};
use async_trait::async_trait;
use std::sync::Arc;
use vmcp_types::{Arguments, BackendDescriptor, PromptResult, ResourceResult, ToolResult};

/// A live connection to a single backend MCP server.
///
/// Implementors own their transport (stdio subprocess, HTTP, WebSocket,
/// whatever) and must already be initialized by the time they are handed to
/// a `Session`. `Close` must be idempotent: calling it twice, or calling it
/// concurrently with an in-flight dispatch, must not panic or corrupt state.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// List every tool this backend currently exposes, in its own names —
    /// exposed-name assignment happens later, during aggregation.
    async fn list_tools(&self) -> Result<Vec<RawTool>, BackendError>;

    /// List every resource this backend currently exposes, in its own names.
    async fn list_resources(&self) -> Result<Vec<RawResource>, BackendError>;

    /// List every prompt this backend currently exposes, in its own names.
    async fn list_prompts(&self) -> Result<Vec<RawPrompt>, BackendError>;

    /// Invoke a tool by its name as the backend itself knows it (never the
    /// exposed/prefixed name).
    async fn call_tool(
        &self,
        original_name: &str,
        arguments: Arguments,
    ) -> Result<ToolResult, BackendError>;

    /// Read a resource by its URI as the backend itself knows it.
    async fn read_resource(&self, original_uri: &str) -> Result<ResourceResult, BackendError>;

    /// Fetch a prompt by its name as the backend itself knows it.
    async fn get_prompt(
        &self,
        original_name: &str,
        arguments: Arguments,
    ) -> Result<PromptResult, BackendError>;

    /// Release any resources (connections, subprocess handles) held by this
    /// client. Must be safe to call more than once. A failure here is
    /// logged and folded into `Session::close`'s combined error; it never
    /// prevents the session from being torn down.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Error surfaced by a `BackendClient` implementation, distinct from
/// `vmcp_types::SessionError` because it describes a transport/protocol
/// failure before the session layer has had a chance to classify it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached at all (connection refused, DNS
    /// failure, subprocess exited).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend responded with a protocol-level error.
    #[error("backend protocol error: {0}")]
    Protocol(String),

    /// The call did not complete within the caller-supplied timeout.
    #[error("backend call timed out")]
    Timeout,
}

/// Connects to and initializes a single backend, producing an already-live
/// [`BackendClient`]. `SessionFactory` holds one of these and calls it once
/// per backend descriptor during `make_session`; it is the seam where a real
/// deployment plugs in its stdio/HTTP/WebSocket transport handshake.
#[async_trait]
pub trait BackendClientFactory: Send + Sync {
    /// Connect to and initialize the backend described by `descriptor`.
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn BackendClient>, BackendError>;
}
