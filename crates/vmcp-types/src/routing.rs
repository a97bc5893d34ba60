//! Per-session routing table.
//!
//! Tools, resources, and prompts are tracked as three separate maps rather
//! than one shared namespace, so a name collision between e.g. a tool and a
//! prompt never aliases.

use crate::backend::BackendId;
use std::collections::HashMap;

/// Where an exposed capability name actually routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Backend that owns this capability.
    pub backend_id: BackendId,
    /// Name the backend knows the capability by — never the exposed name.
    pub original_name: String,
}

impl RouteEntry {
    /// Construct a route entry.
    #[must_use]
    pub fn new(backend_id: impl Into<BackendId>, original_name: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            original_name: original_name.into(),
        }
    }
}

/// Immutable routing table built once at session construction and never
/// mutated for the lifetime of the session.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    tools: HashMap<String, RouteEntry>,
    resources: HashMap<String, RouteEntry>,
    prompts: HashMap<String, RouteEntry>,
}

impl RoutingTable {
    /// Construct a routing table from its three per-kind maps.
    #[must_use]
    pub fn new(
        tools: HashMap<String, RouteEntry>,
        resources: HashMap<String, RouteEntry>,
        prompts: HashMap<String, RouteEntry>,
    ) -> Self {
        Self {
            tools,
            resources,
            prompts,
        }
    }

    /// Resolve an exposed tool name.
    #[must_use]
    pub fn resolve_tool(&self, exposed_name: &str) -> Option<&RouteEntry> {
        self.tools.get(exposed_name)
    }

    /// Resolve an exposed resource URI.
    #[must_use]
    pub fn resolve_resource(&self, exposed_uri: &str) -> Option<&RouteEntry> {
        self.resources.get(exposed_uri)
    }

    /// Resolve an exposed prompt name.
    #[must_use]
    pub fn resolve_prompt(&self, exposed_name: &str) -> Option<&RouteEntry> {
        self.prompts.get(exposed_name)
    }

    /// Every backend id referenced by any entry in this table. May repeat a
    /// backend id once per capability kind it appears under; callers that
    /// need a set should collect and dedupe.
    ///
    /// `Session::new` asserts every id this yields has a corresponding entry
    /// in its client map, in debug builds.
    pub fn referenced_backends(&self) -> impl Iterator<Item = &BackendId> {
        self.tools
            .values()
            .chain(self.resources.values())
            .chain(self.prompts.values())
            .map(|entry| &entry.backend_id)
    }

    /// Number of tool routes (for tests/diagnostics).
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Number of resource routes (for tests/diagnostics).
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of prompt routes (for tests/diagnostics).
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_kind_independently() {
        let mut tools = HashMap::new();
        tools.insert("create".to_string(), RouteEntry::new("a", "create"));
        let mut prompts = HashMap::new();
        prompts.insert("create".to_string(), RouteEntry::new("b", "make"));

        let table = RoutingTable::new(tools, HashMap::new(), prompts);

        assert_eq!(table.resolve_tool("create").unwrap().backend_id.as_str(), "a");
        assert_eq!(table.resolve_prompt("create").unwrap().backend_id.as_str(), "b");
        assert!(table.resolve_resource("create").is_none());
    }

    #[test]
    fn referenced_backends_deduplicates_across_kinds() {
        let mut tools = HashMap::new();
        tools.insert("t1".into(), RouteEntry::new("a", "t1"));
        tools.insert("t2".into(), RouteEntry::new("a", "t2"));
        let mut resources = HashMap::new();
        resources.insert("r1".into(), RouteEntry::new("b", "r1"));

        let table = RoutingTable::new(tools, resources, HashMap::new());
        let mut backends: Vec<_> = table.referenced_backends().map(|b| b.as_str()).collect();
        backends.sort_unstable();
        backends.dedup();
        assert_eq!(backends, vec!["a", "b"]);
    }
}
