//! Image delivery.
//!
//! Publishes an image notice on the session's event bus. Storage and
//! rendering of the actual bytes are the observer's concern; the tool
//! result confirms delivery to the model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use gantry_core::events::{AgentEvent, EventPublisher};
use gantry_core::messages::Role;
use gantry_llm::types::ToolSpec;

use super::{object_schema, ToolContext, ToolError, ToolHandler, ToolOutput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendImageParams {
    data: String,
    #[serde(default)]
    caption: Option<String>,
}

/// `sendImage` — show the user an image (screenshot, diagram, plot).
pub struct SendImageTool {
    events: Arc<dyn EventPublisher>,
}

impl SendImageTool {
    /// Create the tool over the event publisher.
    pub fn new(events: Arc<dyn EventPublisher>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ToolHandler for SendImageTool {
    fn name(&self) -> &str {
        "sendImage"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "sendImage".into(),
            description: "Send an image to the user, e.g. a screenshot or a diagram.".into(),
            input_schema: object_schema(&[
                (
                    "data",
                    json!({"type": "string", "description": "Base64-encoded image data"}),
                    true,
                ),
                (
                    "mimeType",
                    json!({"type": "string", "description": "Image MIME type, defaults to image/png"}),
                    false,
                ),
                (
                    "caption",
                    json!({"type": "string", "description": "Optional caption"}),
                    false,
                ),
            ]),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: SendImageParams = serde_json::from_value(input)?;
        if params.data.is_empty() {
            return Err(ToolError::InvalidInput("data must not be empty".into()));
        }
        let text = params
            .caption
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "[image]".to_owned());
        self.events
            .publish(
                &ctx.worker_id,
                AgentEvent::Message {
                    role: Role::Assistant,
                    text,
                },
            )
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(ToolOutput::Text("Image sent to the user.".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
