//! Aggregated capability types (tools, resources, prompts).
//!
//! Field shapes follow the MCP 2025-06-18 conventions used throughout the
//! surrounding ecosystem (see `turbomcp-protocol`'s `Tool`/`Resource`/`Prompt`)
//! so a real `Aggregator`/`BackendClient` implementation can populate these
//! without renaming fields, even though wire framing itself stays out of
//! scope here.

use crate::backend::BackendId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool exposed by an aggregated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name the client sees; may be prefixed by the aggregator to resolve
    /// collisions.
    pub exposed_name: String,
    /// Which backend provides this tool.
    pub backend_id: BackendId,
    /// Name the backend itself knows the tool by.
    pub original_name: String,
    /// Human-readable description, if the backend provided one.
    pub description: Option<String>,
    /// JSON Schema for the tool's input, if the backend provided one.
    pub input_schema: Option<serde_json::Value>,
}

/// A resource exposed by an aggregated session, keyed by URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// URI the client sees.
    pub exposed_uri: String,
    /// Which backend provides this resource.
    pub backend_id: BackendId,
    /// URI the backend itself knows the resource by.
    pub original_uri: String,
    /// Human-readable description, if the backend provided one.
    pub description: Option<String>,
    /// MIME type, if known.
    pub mime_type: Option<String>,
}

/// A prompt exposed by an aggregated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Name the client sees; may be prefixed by the aggregator to resolve
    /// collisions.
    pub exposed_name: String,
    /// Which backend provides this prompt.
    pub backend_id: BackendId,
    /// Name the backend itself knows the prompt by.
    pub original_name: String,
    /// Human-readable description, if the backend provided one.
    pub description: Option<String>,
    /// Named template arguments the prompt accepts.
    pub arguments: Vec<PromptArgument>,
}

/// A single named argument a prompt template accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// Arguments passed to a tool call or prompt fetch.
pub type Arguments = HashMap<String, serde_json::Value>;

/// Result of a successful tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Free-form content blocks returned by the backend, passed through
    /// verbatim — backend errors are propagated as-is, never rewritten.
    pub content: serde_json::Value,
    /// Whether the backend flagged this as an error result.
    pub is_error: bool,
}

/// Result of a successful resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResult {
    /// URI actually read (the backend's `original_uri`).
    pub uri: String,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// Resource contents, passed through verbatim.
    pub contents: serde_json::Value,
}

/// Result of a successful prompt fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    /// Optional description returned by the backend.
    pub description: Option<String>,
    /// Rendered prompt messages, passed through verbatim.
    pub messages: serde_json::Value,
}
