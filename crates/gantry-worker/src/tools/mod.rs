//! Tool handler contract and registry.
//!
//! Each tool declares a name and a JSON-schema spec for the catalog, and
//! validates its own input by deserializing into a typed parameter struct.
//! Validation failures and handler errors both surface as textual tool
//! results — never as turn failures.

pub mod report_progress;
pub mod send_image;
pub mod todo;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use gantry_core::content::ToolResultBlock;
use gantry_llm::types::ToolSpec;

use crate::preferences::Preferences;

pub use report_progress::ReportProgressTool;
pub use send_image::SendImageTool;
pub use todo::{TodoInitTool, TodoUpdateTool};

/// Tools every session gets, regardless of the agent definition.
pub const REQUIRED_TOOL_NAMES: &[&str] =
    &["reportProgress", "todoInit", "todoUpdate", "sendImage"];

/// Context handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    /// Unique id of this tool call.
    pub tool_use_id: String,
    /// Session the tool runs for.
    pub worker_id: String,
    /// Process preferences.
    pub preferences: Arc<Preferences>,
}

/// What a tool returns.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    /// A single text block.
    Text(String),
    /// Structured parts (text and images).
    Blocks(Vec<ToolResultBlock>),
}

/// Tool failure, converted to an error-status tool result by the loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Input did not match the tool's schema.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The handler failed.
    #[error("{0}")]
    Failed(String),
    /// No handler with that name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// One invocable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool name — the exact string the model calls.
    fn name(&self) -> &str;

    /// Spec sent to the model.
    fn spec(&self) -> ToolSpec;

    /// Execute with raw JSON input.
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Registry of built-in tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous handler with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Specs for the given names, in the given order; unknown names are
    /// skipped.
    #[must_use]
    pub fn specs_for(&self, names: &[String]) -> Vec<ToolSpec> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.spec()))
            .collect()
    }
}

/// Build an object schema from property name/schema/required triples.
pub(crate) fn object_schema(properties: &[(&str, Value, bool)]) -> Value {
    let mut props = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, schema, is_required) in properties {
        let _ = props.insert((*name).to_owned(), schema.clone());
        if *is_required {
            required.push(Value::String((*name).to_owned()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".into(),
                description: "Echo the input".into(),
                input_schema: object_schema(&[(
                    "text",
                    serde_json::json!({"type": "string"}),
                    true,
                )]),
            }
        }

        async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            let text = input
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("text is required".into()))?;
            Ok(ToolOutput::Text(text.to_owned()))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            tool_use_id: "t1".into(),
            worker_id: "w".into(),
            preferences: Arc::new(Preferences::default()),
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn specs_for_skips_unknown_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let specs = registry.specs_for(&["echo".into(), "ghost".into()]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
    }

    #[tokio::test]
    async fn execute_through_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let tool = registry.get("echo").unwrap();
        let out = tool
            .execute(serde_json::json!({"text": "hi"}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Text("hi".into()));
    }

    #[test]
    fn object_schema_shape() {
        let schema = object_schema(&[
            ("a", serde_json::json!({"type": "string"}), true),
            ("b", serde_json::json!({"type": "number"}), false),
        ]);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["a"]));
        assert_eq!(schema["properties"]["b"]["type"], "number");
    }

    #[test]
    fn serde_error_maps_to_invalid_input() {
        let err = serde_json::from_value::<u32>(Value::String("x".into())).unwrap_err();
        let tool_err: ToolError = err.into();
        assert!(matches!(tool_err, ToolError::InvalidInput(_)));
    }
}
