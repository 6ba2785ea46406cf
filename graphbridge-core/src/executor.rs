//! Tool execution entry point.
//!
//! [`ToolExecutor::execute_endpoint_call`] resolves a tool by name, compiles
//! the caller's parameters and runs the request. Every failure is folded into
//! a [`ToolResult`] with `is_error` set, so callers only ever handle data.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::client::GraphClient;
use crate::compiler::RequestCompiler;
use crate::registry::ToolRegistry;
use crate::response::ResponseMeta;

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub data: Value,
    pub is_error: bool,
    #[serde(skip_serializing_if = "ResponseMeta::is_empty")]
    pub meta: ResponseMeta,
}

impl ToolResult {
    pub fn ok(data: Value, meta: ResponseMeta) -> Self {
        Self {
            data,
            is_error: false,
            meta,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: json!({ "error": message.into() }),
            is_error: true,
            meta: ResponseMeta::default(),
        }
    }
}

/// Runs named tools from a registry against Graph.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    compiler: RequestCompiler,
    client: Arc<GraphClient>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, client: Arc<GraphClient>) -> Self {
        Self::with_compiler(registry, client, RequestCompiler::default())
    }

    pub fn with_compiler(registry: Arc<ToolRegistry>, client: Arc<GraphClient>, compiler: RequestCompiler) -> Self {
        Self {
            registry,
            compiler,
            client,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute the tool `name` with `params`.
    ///
    /// An unknown name fails before any network activity.
    pub async fn execute_endpoint_call(&self, name: &str, params: &Map<String, Value>) -> ToolResult {
        let Some(entry) = self.registry.get(name) else {
            tracing::warn!("Tool not found: {}", name);
            return ToolResult::error(format!("Tool not found: {}", name));
        };

        tracing::info!("Tool {} called", name);
        let descriptor = self.compiler.compile(&entry.endpoint, params);

        match self.client.request(&descriptor).await {
            Ok(response) => ToolResult::ok(response.data, response.meta),
            Err(e) => {
                tracing::error!("Error in tool {}: {}", name, e);
                ToolResult::error(format!("Error in tool {}: {}", name, e))
            }
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.registry.len())
            .field("client", &self.client)
            .finish()
    }
}
