//! Minimal `mcp://server/tool` dispatch adapter.
//!
//! External tool-protocol clients (subprocess transport, JSON-RPC framing) are out
//! of scope for this crate. Instead, callers register a handler per server name
//! with [`McpAdapter::register_server`]; a server with no registered handler fails
//! with a clear [`BeemFlowError::Adapter`] rather than silently no-opping.

use super::*;
use crate::constants::*;
use dashmap::DashMap;
use std::sync::Arc;

/// Handles one MCP server's tool calls: tool name plus JSON inputs in, JSON output.
pub type McpHandler = Arc<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;

pub struct McpAdapter {
    handlers: DashMap<String, McpHandler>,
}

impl McpAdapter {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Registers (or replaces) the handler for `server_name`.
    pub fn register_server(&self, server_name: impl Into<String>, handler: McpHandler) {
        self.handlers.insert(server_name.into(), handler);
    }

    fn execute_mcp_call(
        &self,
        tool_use: &str,
        inputs: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let stripped = tool_use.strip_prefix(ADAPTER_PREFIX_MCP).ok_or_else(|| {
            crate::BeemFlowError::adapter(format!(
                "invalid mcp:// format: {tool_use} (expected mcp://server/tool)"
            ))
        })?;

        let mut parts = stripped.splitn(2, '/');
        let server_name = parts.next().filter(|s| !s.is_empty());
        let tool_name = parts.next().filter(|s| !s.is_empty() && !s.contains('/'));

        let (server_name, tool_name) = match (server_name, tool_name) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                return Err(crate::BeemFlowError::adapter(format!(
                    "invalid mcp:// format: {tool_use} (expected mcp://server/tool)"
                )));
            }
        };

        let handler = self.handlers.get(server_name).map(|e| e.clone()).ok_or_else(|| {
            crate::BeemFlowError::adapter(format!(
                "no MCP handler registered for server '{server_name}'"
            ))
        })?;

        let payload = serde_json::to_value(&inputs)?;
        let result = handler(tool_name, payload)?;

        let mut outputs = HashMap::new();
        match result.as_object() {
            Some(obj) => outputs.extend(obj.clone()),
            None => {
                outputs.insert("result".to_string(), result);
            }
        }
        Ok(outputs)
    }
}

impl Default for McpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for McpAdapter {
    fn id(&self) -> &str {
        ADAPTER_MCP
    }

    async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        _ctx: &super::ExecutionContext,
    ) -> Result<HashMap<String, Value>> {
        let tool_use = inputs
            .get(PARAM_SPECIAL_USE)
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::BeemFlowError::adapter("missing __use for McpAdapter"))?
            .to_string();

        self.execute_mcp_call(&tool_use, inputs)
    }

    fn manifest(&self) -> Option<ToolManifest> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
