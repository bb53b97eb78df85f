//! MCP routing seam.
//!
//! Transport and server lifecycle are the host's business; the loop only
//! needs to ask whether a tool name is served, fetch specs for the catalog,
//! and dispatch calls. Results come back as tool-result parts (text or
//! image) like any built-in tool.

use async_trait::async_trait;
use serde_json::Value;

use gantry_llm::types::ToolSpec;

use crate::tools::{ToolError, ToolOutput};

/// Routes tool calls to MCP servers.
#[async_trait]
pub trait McpRouter: Send + Sync {
    /// Tool specs contributed to the catalog.
    fn tool_specs(&self) -> Vec<ToolSpec>;

    /// Whether the named tool is served by an MCP server.
    fn serves(&self, tool_name: &str) -> bool;

    /// Dispatch one call.
    async fn call(&self, tool_name: &str, input: &Value) -> Result<ToolOutput, ToolError>;
}

/// Router that serves nothing.
#[derive(Debug, Default)]
pub struct NullMcpRouter;

#[async_trait]
impl McpRouter for NullMcpRouter {
    fn tool_specs(&self) -> Vec<ToolSpec> {
        Vec::new()
    }

    fn serves(&self, _tool_name: &str) -> bool {
        false
    }

    async fn call(&self, tool_name: &str, _input: &Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::UnknownTool(tool_name.to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
