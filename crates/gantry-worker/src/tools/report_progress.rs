//! Progress reporting.
//!
//! The loop treats this tool specially after dispatch: the reported text
//! joins the conversation transcript and refreshes the last-report
//! timestamp that drives the renderer's periodic progress echo.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use gantry_llm::types::ToolSpec;

use super::{object_schema, ToolContext, ToolError, ToolHandler, ToolOutput};

#[derive(Debug, Deserialize)]
struct ReportProgressParams {
    message: String,
}

/// `reportProgress` — narrate what the agent is doing.
#[derive(Debug, Default)]
pub struct ReportProgressTool;

#[async_trait]
impl ToolHandler for ReportProgressTool {
    fn name(&self) -> &str {
        "reportProgress"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "reportProgress".into(),
            description: "Report progress on the current task to the user. Use this \
                          whenever you start or finish a meaningful step."
                .into(),
            input_schema: object_schema(&[(
                "message",
                json!({"type": "string", "description": "A short progress update in the user's language"}),
                true,
            )]),
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: ReportProgressParams = serde_json::from_value(input)?;
        if params.message.trim().is_empty() {
            return Err(ToolError::InvalidInput("message must not be empty".into()));
        }
        Ok(ToolOutput::Text("Progress reported.".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
