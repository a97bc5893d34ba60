//! An in-memory `BackendClient` for exercising session/routing logic without
//! a real transport. Not exported to consumers outside this workspace; it
//! exists purely so `vmcp-session`'s tests can drive real dispatch paths.

use crate::aggregate::{RawPrompt, RawResource, RawTool};
use crate::client::{BackendClient, BackendClientFactory, BackendError};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vmcp_types::{Arguments, BackendDescriptor, BackendId, PromptResult, ResourceResult, ToolResult};

/// A scriptable backend client: returns fixed capability lists and records
/// every call it receives, including whether `close` was ever invoked.
pub struct MockBackendClient {
    tools: Vec<RawTool>,
    resources: Vec<RawResource>,
    prompts: Vec<RawPrompt>,
    closed: AtomicBool,
    calls: Mutex<Vec<String>>,
    fail_calls: bool,
    fail_close: bool,
}

impl MockBackendClient {
    /// Construct an empty mock with no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
            closed: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            fail_calls: false,
            fail_close: false,
        }
    }

    /// Attach a tool this mock will report via `list_tools`.
    #[must_use]
    pub fn with_tool(mut self, tool: RawTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Attach a resource this mock will report via `list_resources`.
    #[must_use]
    pub fn with_resource(mut self, resource: RawResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Attach a prompt this mock will report via `list_prompts`.
    #[must_use]
    pub fn with_prompt(mut self, prompt: RawPrompt) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Make every dispatch call fail, to exercise error propagation paths.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    /// Make `close` report an error, to exercise `Session::close`'s
    /// combined-error path. The client is still marked closed — a failed
    /// close must not block teardown.
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Whether `close` has been called at least once.
    #[must_use]
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every call name this mock has received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Default for MockBackendClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for MockBackendClient {
    async fn list_tools(&self) -> Result<Vec<RawTool>, BackendError> {
        self.calls.lock().push("list_tools".to_string());
        Ok(self.tools.clone())
    }

    async fn list_resources(&self) -> Result<Vec<RawResource>, BackendError> {
        self.calls.lock().push("list_resources".to_string());
        Ok(self.resources.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<RawPrompt>, BackendError> {
        self.calls.lock().push("list_prompts".to_string());
        Ok(self.prompts.clone())
    }

    async fn call_tool(&self, original_name: &str, _arguments: Arguments) -> Result<ToolResult, BackendError> {
        self.calls.lock().push(format!("call_tool:{original_name}"));
        if self.fail_calls {
            return Err(BackendError::Protocol("mock failure".to_string()));
        }
        Ok(ToolResult {
            content: serde_json::json!({ "ok": true, "tool": original_name }),
            is_error: false,
        })
    }

    async fn read_resource(&self, original_uri: &str) -> Result<ResourceResult, BackendError> {
        self.calls.lock().push(format!("read_resource:{original_uri}"));
        if self.fail_calls {
            return Err(BackendError::Protocol("mock failure".to_string()));
        }
        Ok(ResourceResult {
            uri: original_uri.to_string(),
            mime_type: Some("text/plain".to_string()),
            contents: serde_json::json!("mock contents"),
        })
    }

    async fn get_prompt(&self, original_name: &str, _arguments: Arguments) -> Result<PromptResult, BackendError> {
        self.calls.lock().push(format!("get_prompt:{original_name}"));
        if self.fail_calls {
            return Err(BackendError::Protocol("mock failure".to_string()));
        }
        Ok(PromptResult {
            description: None,
            messages: serde_json::json!([]),
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.calls.lock().push("close".to_string());
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(BackendError::Protocol("mock close failure".to_string()));
        }
        Ok(())
    }
}

/// Scriptable [`BackendClientFactory`] for exercising `SessionFactory`:
/// connects instantly by default, but individual backend ids can be
/// configured to fail outright or hang past a deadline so tests can drive
/// the partial-init-failure and per-backend-timeout paths without a real
/// transport.
#[derive(Default)]
pub struct MockBackendClientFactory {
    clients: DashMap<BackendId, Vec<RawTool>>,
    preset: DashMap<BackendId, Arc<MockBackendClient>>,
    failing: DashMap<BackendId, ()>,
    hanging: DashMap<BackendId, Duration>,
}

impl MockBackendClientFactory {
    /// Construct a factory where every backend connects successfully with no
    /// capabilities by default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a backend a fixed set of tools to report once connected.
    #[must_use]
    pub fn with_tools(self, backend_id: impl Into<BackendId>, tools: Vec<RawTool>) -> Self {
        self.clients.insert(backend_id.into(), tools);
        self
    }

    /// Hand the factory a specific client instance to return for this
    /// backend id, so a test can retain its own handle and observe calls
    /// (including `close`) made against the exact instance a session ends
    /// up holding.
    #[must_use]
    pub fn with_client(self, backend_id: impl Into<BackendId>, client: Arc<MockBackendClient>) -> Self {
        self.preset.insert(backend_id.into(), client);
        self
    }

    /// Make connecting to this backend id fail immediately.
    #[must_use]
    pub fn with_failure(self, backend_id: impl Into<BackendId>) -> Self {
        self.failing.insert(backend_id.into(), ());
        self
    }

    /// Make connecting to this backend id take longer than `delay` before
    /// succeeding, to exercise per-backend deadline enforcement.
    #[must_use]
    pub fn with_delay(self, backend_id: impl Into<BackendId>, delay: Duration) -> Self {
        self.hanging.insert(backend_id.into(), delay);
        self
    }
}

#[async_trait]
impl BackendClientFactory for MockBackendClientFactory {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn BackendClient>, BackendError> {
        if self.failing.contains_key(&descriptor.id) {
            return Err(BackendError::Unreachable(format!(
                "mock backend {} configured to fail",
                descriptor.id
            )));
        }

        if let Some(delay) = self.hanging.get(&descriptor.id).map(|d| *d) {
            tokio::time::sleep(delay).await;
        }

        if let Some(client) = self.preset.get(&descriptor.id) {
            return Ok(client.clone() as Arc<dyn BackendClient>);
        }

        let tools = self
            .clients
            .get(&descriptor.id)
            .map(|entry| entry.clone())
            .unwrap_or_default();

        let mut mock = MockBackendClient::new();
        for tool in tools {
            mock = mock.with_tool(tool);
        }
        Ok(Arc::new(mock))
    }
}
