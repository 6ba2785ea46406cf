//! Filtered, indexed view of the endpoint catalog.
//!
//! The registry is built once from a [`Catalog`] and [`RegistryOptions`] and
//! is read-only afterwards, so it can be shared freely behind an `Arc`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::categories::find_category;
use crate::model::EndpointDefinition;
use crate::scopes::compile_name_filter;

/// Default number of results returned by [`ToolRegistry::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Operating-mode filters applied when building the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOptions {
    /// Drop every endpoint that is not a GET.
    pub read_only: bool,
    /// Keep endpoints that need organizational accounts.
    pub org_mode: bool,
    /// Case-insensitive allow-list pattern over tool names.
    pub enabled_tools: Option<String>,
}

/// A retained endpoint and its resolved description.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEntry {
    pub endpoint: EndpointDefinition,
    pub description: String,
}

impl ToolEntry {
    fn from_endpoint(endpoint: EndpointDefinition) -> Self {
        let mut description = endpoint
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Execute {} request to {}", endpoint.method, endpoint.path));
        if let Some(tip) = &endpoint.llm_tip {
            description.push_str("\n\nTIP: ");
            description.push_str(tip);
        }
        Self {
            endpoint,
            description,
        }
    }

    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    pub fn path(&self) -> &str {
        &self.endpoint.path
    }
}

/// Immutable name-indexed tool table.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build the registry, applying the org, read-only and name filters in that order.
    pub fn build(catalog: &Catalog, options: &RegistryOptions) -> Self {
        let filter = compile_name_filter(options.enabled_tools.as_deref());
        if filter.is_some() {
            tracing::info!(
                "Tool filtering enabled with pattern: {}",
                options.enabled_tools.as_deref().unwrap_or_default()
            );
        }

        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for endpoint in catalog.endpoints() {
            if !options.org_mode && endpoint.is_org_only() {
                continue;
            }
            if options.read_only && !endpoint.method.is_read() {
                continue;
            }
            if let Some(filter) = &filter {
                if !filter.is_match(&endpoint.name) {
                    continue;
                }
            }

            index.insert(endpoint.name.clone(), entries.len());
            entries.push(ToolEntry::from_endpoint(endpoint.clone()));
        }

        tracing::info!("Tool registry initialized: {} tools available", entries.len());
        Self { entries, index }
    }

    /// Look up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// All tools in catalog order.
    pub fn list(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free-text search over name, path and description.
    ///
    /// An unknown category matches everything, mirroring an absent one.
    pub fn search(&self, query: Option<&str>, category: Option<&str>, limit: usize) -> Vec<&ToolEntry> {
        let query = query.filter(|q| !q.is_empty()).map(str::to_lowercase);
        let category = category.and_then(find_category);

        self.entries
            .iter()
            .filter(|entry| category.is_none_or(|c| c.matches(entry.name())))
            .filter(|entry| match &query {
                Some(q) => format!("{} {} {}", entry.name(), entry.path(), entry.description)
                    .to_lowercase()
                    .contains(q.as_str()),
                None => true,
            })
            .take(limit)
            .collect()
    }
}
