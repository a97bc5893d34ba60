//! Capability aggregation: turning each backend's introspected tools,
//! resources, and prompts into one coherent namespace plus a routing table.
//!
//! `turbomcp-proxy`'s `BackendConnector::introspect` collects one backend's
//! capabilities; the aggregation step here is what the proxy's router did
//! implicitly for a single backend and what a real gateway must do
//! explicitly across many: pick exposed names, detect collisions, and
//! record where each exposed name actually routes.

use std::collections::HashMap;
use vmcp_types::{
    BackendId, Prompt, PromptArgument, Resource, RouteEntry, RoutingTable, Tool,
};

/// Per-backend introspection result, the input to aggregation.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// The backend these capabilities were introspected from.
    pub backend_id: BackendId,
    /// Tools as the backend itself names them.
    pub tools: Vec<RawTool>,
    /// Resources as the backend itself names them.
    pub resources: Vec<RawResource>,
    /// Prompts as the backend itself names them.
    pub prompts: Vec<RawPrompt>,
}

/// A tool exactly as a `BackendClient::list_tools` call returned it, before
/// any exposed-name decision has been made.
#[derive(Debug, Clone)]
pub struct RawTool {
    /// Name the backend answers to.
    pub name: String,
    /// Description, if the backend provided one.
    pub description: Option<String>,
    /// Input schema, if the backend provided one.
    pub input_schema: Option<serde_json::Value>,
}

/// A resource exactly as a `BackendClient::list_resources` call returned it.
#[derive(Debug, Clone)]
pub struct RawResource {
    /// URI the backend answers to.
    pub uri: String,
    /// Description, if the backend provided one.
    pub description: Option<String>,
    /// MIME type, if the backend provided one.
    pub mime_type: Option<String>,
}

/// A prompt exactly as a `BackendClient::list_prompts` call returned it.
#[derive(Debug, Clone)]
pub struct RawPrompt {
    /// Name the backend answers to.
    pub name: String,
    /// Description, if the backend provided one.
    pub description: Option<String>,
    /// Named template arguments.
    pub arguments: Vec<PromptArgument>,
}

/// Output of aggregation: the exposed capability catalog plus the routing
/// table a `Session` dispatches through.
#[derive(Debug, Clone, Default)]
pub struct AggregatedCapabilities {
    /// Tools exposed to the client, in aggregator-determined order.
    pub tools: Vec<Tool>,
    /// Resources exposed to the client.
    pub resources: Vec<Resource>,
    /// Prompts exposed to the client.
    pub prompts: Vec<Prompt>,
    /// Routing table built from the same decisions.
    pub routing: RoutingTable,
}

/// Strategy for turning N backends' capability lists into one namespace.
///
/// Collision handling is entirely an aggregator's own business: the session
/// core only consumes the resulting `AggregatedCapabilities`, so different
/// deployments can swap in whatever policy suits them (error-on-collision,
/// first-wins, backend-priority order, ...) without touching session code.
pub trait Aggregator: Send + Sync {
    /// Combine per-backend capability lists into one exposed namespace.
    fn aggregate(&self, per_backend: Vec<BackendCapabilities>) -> AggregatedCapabilities;
}

/// Reference aggregator: exposes every backend's own names unchanged, and on
/// collision prefixes every contending entry (including the first) with its
/// backend id, `{backend_id}/{original_name}`, so exposed names stay
/// deterministic regardless of which backend happened to register first.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixAggregator;

impl PrefixAggregator {
    /// Construct the aggregator. Carries no configuration; the separator and
    /// collision policy are fixed.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for PrefixAggregator {
    fn aggregate(&self, per_backend: Vec<BackendCapabilities>) -> AggregatedCapabilities {
        let tool_names = collect_name_counts(per_backend.iter().flat_map(|b| b.tools.iter().map(|t| t.name.as_str())));
        let resource_uris = collect_name_counts(per_backend.iter().flat_map(|b| b.resources.iter().map(|r| r.uri.as_str())));
        let prompt_names = collect_name_counts(per_backend.iter().flat_map(|b| b.prompts.iter().map(|p| p.name.as_str())));

        let mut tools = Vec::new();
        let mut resources = Vec::new();
        let mut prompts = Vec::new();
        let mut tool_routes = HashMap::new();
        let mut resource_routes = HashMap::new();
        let mut prompt_routes = HashMap::new();

        for backend in per_backend {
            for raw in backend.tools {
                let exposed_name = expose_name(&backend.backend_id, &raw.name, tool_names[raw.name.as_str()] > 1);
                tool_routes.insert(
                    exposed_name.clone(),
                    RouteEntry::new(backend.backend_id.clone(), raw.name.clone()),
                );
                tools.push(Tool {
                    exposed_name,
                    backend_id: backend.backend_id.clone(),
                    original_name: raw.name,
                    description: raw.description,
                    input_schema: raw.input_schema,
                });
            }

            for raw in backend.resources {
                let exposed_uri = expose_name(&backend.backend_id, &raw.uri, resource_uris[raw.uri.as_str()] > 1);
                resource_routes.insert(
                    exposed_uri.clone(),
                    RouteEntry::new(backend.backend_id.clone(), raw.uri.clone()),
                );
                resources.push(Resource {
                    exposed_uri,
                    backend_id: backend.backend_id.clone(),
                    original_uri: raw.uri,
                    description: raw.description,
                    mime_type: raw.mime_type,
                });
            }

            for raw in backend.prompts {
                let exposed_name = expose_name(&backend.backend_id, &raw.name, prompt_names[raw.name.as_str()] > 1);
                prompt_routes.insert(
                    exposed_name.clone(),
                    RouteEntry::new(backend.backend_id.clone(), raw.name.clone()),
                );
                prompts.push(Prompt {
                    exposed_name,
                    backend_id: backend.backend_id.clone(),
                    original_name: raw.name,
                    description: raw.description,
                    arguments: raw.arguments,
                });
            }
        }

        AggregatedCapabilities {
            tools,
            resources,
            prompts,
            routing: RoutingTable::new(tool_routes, resource_routes, prompt_routes),
        }
    }
}

fn expose_name(backend_id: &BackendId, original: &str, collided: bool) -> String {
    if collided {
        format!("{backend_id}/{original}")
    } else {
        original.to_string()
    }
}

fn collect_name_counts<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for name in names {
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}
