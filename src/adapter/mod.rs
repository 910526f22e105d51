//! Adapter registry and contract for tool execution.
//!
//! Built-in names the engine expects: `core` (handles `core.*`), `mcp` (handles
//! `mcp://...`), and `http` (generic HTTP). Concrete production adapters are an
//! external collaborator's job; this crate ships only the minimal implementations
//! needed to exercise the engine's adapter-dispatch contract end to end.

pub mod core;
pub mod http;
pub mod mcp;

use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A tool's declared parameters and defaults, used for input auto-fill.
#[derive(Debug, Clone)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    pub kind: String,
    /// JSON-Schema-like mapping with `properties` and `required`.
    pub parameters: HashMap<String, Value>,
    pub endpoint: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

/// Per-call context passed to adapters alongside their inputs.
///
/// Carries a cancellation token propagated from the caller of `Engine::execute`/
/// `resume`. The engine itself never cancels a parallel sibling on another's
/// failure — this token only reflects a top-level cancellation signal from outside
/// the engine. Adapters MAY honor it; honoring it is not required.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub cancellation: CancellationToken,
}

/// Unit of execution outside the engine: an HTTP call, a core builtin, an external
/// tool-protocol operation. Registered by name.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Unique adapter name.
    fn id(&self) -> &str;

    /// Executes the tool. `inputs` may carry the reserved `__use` key identifying
    /// the concrete tool for generic dispatchers (`core`, `mcp`).
    async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<HashMap<String, Value>>;

    fn manifest(&self) -> Option<ToolManifest>;

    fn as_any(&self) -> &dyn std::any::Any;

    /// Releases any resources held by this adapter (subprocesses, connection
    /// pools). The default implementation is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Name → adapter lookup, backed by a lock-free concurrent map.
pub struct AdapterRegistry {
    adapters: Arc<DashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(DashMap::new()),
        }
    }

    pub fn register(&self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(id).map(|entry| Arc::clone(&*entry))
    }

    pub fn all(&self) -> Vec<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .map(|entry| Arc::clone(&*entry))
            .collect()
    }

    /// Closes every registered adapter, collecting the first error (if any) while
    /// still attempting to close the rest.
    pub async fn close_all(&self) -> Result<()> {
        let mut first_err = None;
        for adapter in self.all() {
            if let Err(e) = adapter.close().await
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub use core::CoreAdapter;
pub use http::HttpAdapter;
pub use mcp::McpAdapter;

#[cfg(test)]
mod adapter_test;
